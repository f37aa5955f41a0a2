//! Economy engine.
//!
//! Pure decision logic: every function takes the balances the router just
//! read, the command's amount and game parameters, and (where the outcome is
//! random) a [SampleSource]. Nothing here touches the ledger. A returned
//! [Rejection] means no balance may change.

use coinhouse_types::GameKind;

use crate::error::{Rejection, ValidationError};
use crate::loot::LootTable;
use crate::rng::SampleSource;

/// Result of a single-draw wager.
#[derive(Clone, Debug, PartialEq)]
pub struct WagerOutcome {
    pub game: GameKind,
    pub amount: i64,
    pub won: bool,
    pub sample: f64,
    pub balance_before: i64,
    pub balance_after: i64,
}

impl WagerOutcome {
    pub fn delta(&self) -> i64 {
        self.balance_after - self.balance_before
    }
}

/// Resolve a coinflip or blackjack wager.
///
/// One sample is drawn; a sample strictly below `win_rate` wins `amount`,
/// anything else loses it.
pub fn resolve_wager(
    balance: i64,
    amount: i64,
    game: GameKind,
    win_rate: f64,
    rng: &mut impl SampleSource,
) -> Result<WagerOutcome, Rejection> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount.into());
    }
    if amount > balance {
        return Err(Rejection::InsufficientFunds {
            required: amount,
            available: balance,
        });
    }
    let Some(win_balance) = balance.checked_add(amount) else {
        return Err(ValidationError::InvalidAmount.into());
    };

    let sample = rng.sample();
    let won = sample < win_rate;
    let balance_after = if won { win_balance } else { balance - amount };

    Ok(WagerOutcome {
        game,
        amount,
        won,
        sample,
        balance_before: balance,
        balance_after,
    })
}

/// Result of opening a batch of chests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChestOutcome {
    pub count: i64,
    pub cost: i64,
    /// One reward per chest, in draw order.
    pub rewards: Vec<i64>,
    pub total_reward: i64,
    pub balance_before: i64,
    pub balance_after: i64,
}

impl ChestOutcome {
    pub fn delta(&self) -> i64 {
        self.balance_after - self.balance_before
    }

    pub fn best_reward(&self) -> i64 {
        self.rewards.iter().copied().max().unwrap_or(0)
    }
}

/// Buy `count` chests at `price` each and draw one reward per chest.
///
/// The whole purchase settles as a single balance change:
/// `balance - count * price + sum(rewards)`.
pub fn open_chests(
    balance: i64,
    count: i64,
    price: i64,
    table: &LootTable,
    rng: &mut impl SampleSource,
) -> Result<ChestOutcome, Rejection> {
    if count <= 0 {
        return Err(ValidationError::NonPositiveAmount.into());
    }
    let cost = match count.checked_mul(price) {
        Some(cost) if cost <= balance => cost,
        Some(cost) => {
            return Err(Rejection::InsufficientFunds {
                required: cost,
                available: balance,
            })
        }
        None => {
            return Err(Rejection::InsufficientFunds {
                required: i64::MAX,
                available: balance,
            })
        }
    };

    let rewards: Vec<i64> = (0..count).map(|_| table.reward_for(rng.sample())).collect();
    let settled = rewards
        .iter()
        .try_fold(0i64, |total, reward| total.checked_add(*reward))
        .and_then(|total| Some((total, (balance - cost).checked_add(total)?)));
    let Some((total_reward, balance_after)) = settled else {
        return Err(ValidationError::InvalidAmount.into());
    };

    Ok(ChestOutcome {
        count,
        cost,
        rewards,
        total_reward,
        balance_before: balance,
        balance_after,
    })
}

/// Result of moving coins between two accounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    pub amount: i64,
    pub sender_before: i64,
    pub sender_after: i64,
    pub receiver_before: i64,
    pub receiver_after: i64,
}

/// Debit `amount` from the sender and credit it to the receiver.
pub fn transfer(
    sender_balance: i64,
    receiver_balance: i64,
    amount: i64,
) -> Result<TransferOutcome, Rejection> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount.into());
    }
    if amount > sender_balance {
        return Err(Rejection::InsufficientFunds {
            required: amount,
            available: sender_balance,
        });
    }
    let Some(receiver_after) = receiver_balance.checked_add(amount) else {
        return Err(ValidationError::InvalidAmount.into());
    };

    Ok(TransferOutcome {
        amount,
        sender_before: sender_balance,
        sender_after: sender_balance - amount,
        receiver_before: receiver_balance,
        receiver_after,
    })
}

/// Result of an administrator setting a balance outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverrideOutcome {
    pub balance_before: i64,
    pub balance_after: i64,
}

/// Replace a balance with an exact non-negative value. No balance checks.
pub fn override_balance(current: i64, amount: i64) -> Result<OverrideOutcome, Rejection> {
    if amount < 0 {
        return Err(ValidationError::NegativeAmount.into());
    }
    Ok(OverrideOutcome {
        balance_before: current,
        balance_after: amount,
    })
}
