//! Loot chest reward table.
//!
//! Rewards are drawn by cumulative probability: walk the entries in declared
//! order, accumulating probabilities, and pick the first entry whose running
//! total exceeds the sample. A sample past the covered mass pays nothing.

/// One row of a loot table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LootEntry {
    pub probability: f64,
    pub reward: i64,
}

impl LootEntry {
    pub const fn new(probability: f64, reward: i64) -> Self {
        Self {
            probability,
            reward,
        }
    }
}

/// Rows of the chest table, most common first.
pub const STANDARD_LOOT: [LootEntry; 7] = [
    LootEntry::new(0.50, 5_000_000),
    LootEntry::new(0.35, 7_500_000),
    LootEntry::new(0.13, 8_250_000),
    LootEntry::new(0.015, 30_000_000),
    LootEntry::new(0.0039, 50_000_000),
    LootEntry::new(0.001, 100_000_000),
    LootEntry::new(0.0001, 750_000_000),
];

#[derive(Clone, Debug, PartialEq)]
pub struct LootTable {
    entries: Vec<LootEntry>,
}

impl Default for LootTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl LootTable {
    pub fn new(entries: Vec<LootEntry>) -> Self {
        Self { entries }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_LOOT.to_vec())
    }

    pub fn entries(&self) -> &[LootEntry] {
        &self.entries
    }

    /// Probability mass covered by the table. Not normalized.
    pub fn total_probability(&self) -> f64 {
        self.entries.iter().map(|entry| entry.probability).sum()
    }

    /// Reward selected by `sample`, or 0 if the sample lands past the table.
    pub fn reward_for(&self, sample: f64) -> i64 {
        let mut cumulative = 0.0;
        for entry in &self.entries {
            cumulative += entry.probability;
            if cumulative > sample {
                return entry.reward;
            }
        }
        0
    }

    pub fn expected_reward(&self) -> f64 {
        self.entries
            .iter()
            .map(|entry| entry.probability * entry.reward as f64)
            .sum()
    }
}
