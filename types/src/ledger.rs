use serde::{Deserialize, Serialize};

use super::DEFAULT_WAGER_WIN_RATE;

/// A user's coin account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user: String,
    pub balance: i64,
}

impl Account {
    pub fn new(user: impl Into<String>, balance: i64) -> Self {
        Self {
            user: user.into(),
            balance,
        }
    }
}

impl From<(String, i64)> for Account {
    fn from((user, balance): (String, i64)) -> Self {
        Self { user, balance }
    }
}

/// One leg of a multi-account write.
///
/// `before` is what the caller read under the account lock; stores that
/// cannot write several keys atomically use it to undo an applied leg.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceWrite {
    pub user: String,
    pub before: i64,
    pub after: i64,
}

impl BalanceWrite {
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

/// Games resolved as a single probability draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Coinflip,
    Blackjack,
}

impl GameKind {
    pub const ALL: [GameKind; 2] = [GameKind::Coinflip, GameKind::Blackjack];

    /// Key under which the game's win rate is stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Coinflip => "coinflip",
            GameKind::Blackjack => "blackjack",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|game| game.as_str().eq_ignore_ascii_case(name))
    }

    pub fn default_win_rate(&self) -> f64 {
        DEFAULT_WAGER_WIN_RATE
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaderboard entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: String,
    pub balance: i64,
    pub rank: u32,
}

/// Leaderboard
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Build the top `limit` accounts, richest first.
    ///
    /// Equal balances are ordered by user id so the ranking is stable across
    /// stores and calls.
    pub fn from_accounts<I, A>(accounts: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Account>,
    {
        let mut entries: Vec<LeaderboardEntry> = accounts
            .into_iter()
            .map(Into::into)
            .map(|account: Account| LeaderboardEntry {
                user: account.user,
                balance: account.balance,
                rank: 0,
            })
            .collect();

        entries.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.user.cmp(&b.user)));
        entries.truncate(limit);
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
