use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use coinhouse_types::{BalanceWrite, Leaderboard};
use tracing::{error, warn};

use crate::error::StoreError;

/// Durable mapping of user -> balance and game -> win rate.
///
/// The router is the only caller. Implementations need not serialize
/// read-modify-write sequences themselves; the router holds per-account locks
/// around them.
pub trait LedgerStore: Send + Sync {
    /// Current balance, creating the account with `default` if unseen.
    fn get_or_create(
        &self,
        user: &str,
        default: i64,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn upsert_balance(
        &self,
        user: &str,
        balance: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply several balance writes as one unit.
    ///
    /// The default writes sequentially and, on failure, restores each applied
    /// write's `before` value in reverse order. If restoring fails too the
    /// affected accounts are reported through [StoreError::PartialWrite].
    /// Backends with multi-key atomicity should override this.
    fn upsert_balances(
        &self,
        writes: &[BalanceWrite],
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            let mut applied: Vec<&BalanceWrite> = Vec::with_capacity(writes.len());
            for write in writes {
                let err = match self.upsert_balance(&write.user, write.after).await {
                    Ok(()) => {
                        applied.push(write);
                        continue;
                    }
                    Err(err) => err,
                };

                let mut stranded = Vec::new();
                for done in applied.iter().rev() {
                    if let Err(undo) = self.upsert_balance(&done.user, done.before).await {
                        warn!(user = %done.user, ?undo, "failed to roll back balance write");
                        stranded.push(done.user.clone());
                    }
                }
                if stranded.is_empty() {
                    return Err(err);
                }
                error!(?stranded, ?err, "multi-account write left partially applied");
                return Err(StoreError::PartialWrite {
                    stranded,
                    source: Box::new(err),
                });
            }
            Ok(())
        }
    }

    /// Up to `n` accounts, richest first, ties by user id ascending.
    fn top_n_by_balance(
        &self,
        n: usize,
    ) -> impl Future<Output = Result<Leaderboard, StoreError>> + Send;

    /// Current win rate for `game`, creating it with `default` if unseen.
    fn get_or_create_winrate(
        &self,
        game: &str,
        default: f64,
    ) -> impl Future<Output = Result<f64, StoreError>> + Send;

    fn set_winrate(
        &self,
        game: &str,
        rate: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
struct Tables {
    balances: HashMap<String, i64>,
    win_rates: HashMap<String, f64>,
}

/// In-process ledger. Multi-account writes are atomic.
#[derive(Debug, Default)]
pub struct Memory {
    tables: Mutex<Tables>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed accounts without going through the router.
    pub fn with_balances<I, U>(balances: I) -> Self
    where
        I: IntoIterator<Item = (U, i64)>,
        U: Into<String>,
    {
        let memory = Self::default();
        {
            let mut tables = memory.tables();
            for (user, balance) in balances {
                tables.balances.insert(user.into(), balance);
            }
        }
        memory
    }

    /// Stored balance without creating the account.
    pub fn balance(&self, user: &str) -> Option<i64> {
        self.tables().balances.get(user).copied()
    }

    /// Stored win rate without creating the entry.
    pub fn win_rate(&self, game: &str) -> Option<f64> {
        self.tables().win_rates.get(game).copied()
    }

    pub fn accounts(&self) -> usize {
        self.tables().balances.len()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LedgerStore for Memory {
    async fn get_or_create(&self, user: &str, default: i64) -> Result<i64, StoreError> {
        Ok(*self
            .tables()
            .balances
            .entry(user.to_string())
            .or_insert(default))
    }

    async fn upsert_balance(&self, user: &str, balance: i64) -> Result<(), StoreError> {
        self.tables().balances.insert(user.to_string(), balance);
        Ok(())
    }

    async fn upsert_balances(&self, writes: &[BalanceWrite]) -> Result<(), StoreError> {
        let mut tables = self.tables();
        for write in writes {
            tables.balances.insert(write.user.clone(), write.after);
        }
        Ok(())
    }

    async fn top_n_by_balance(&self, n: usize) -> Result<Leaderboard, StoreError> {
        let tables = self.tables();
        Ok(Leaderboard::from_accounts(
            tables
                .balances
                .iter()
                .map(|(user, balance)| (user.clone(), *balance)),
            n,
        ))
    }

    async fn get_or_create_winrate(&self, game: &str, default: f64) -> Result<f64, StoreError> {
        Ok(*self
            .tables()
            .win_rates
            .entry(game.to_string())
            .or_insert(default))
    }

    async fn set_winrate(&self, game: &str, rate: f64) -> Result<(), StoreError> {
        self.tables().win_rates.insert(game.to_string(), rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinhouse_types::{DEFAULT_WIN_RATE, STARTING_BALANCE};
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_get_or_create_persists_default() {
        let memory = Memory::new();
        assert_eq!(memory.balance("new"), None);
        assert_eq!(
            memory.get_or_create("new", STARTING_BALANCE).await.unwrap(),
            STARTING_BALANCE
        );
        assert_eq!(memory.balance("new"), Some(STARTING_BALANCE));

        // A later default does not overwrite the stored value.
        assert_eq!(memory.get_or_create("new", 5).await.unwrap(), STARTING_BALANCE);
    }

    #[tokio::test]
    async fn test_winrate_defaults_then_updates() {
        let memory = Memory::new();
        assert_eq!(
            memory
                .get_or_create_winrate("coinflip", DEFAULT_WIN_RATE)
                .await
                .unwrap(),
            DEFAULT_WIN_RATE
        );
        memory.set_winrate("coinflip", 0.25).await.unwrap();
        assert_eq!(
            memory
                .get_or_create_winrate("coinflip", DEFAULT_WIN_RATE)
                .await
                .unwrap(),
            0.25
        );
        assert_eq!(memory.win_rate("blackjack"), None);
    }

    #[tokio::test]
    async fn test_top_n_orders_and_limits() {
        let memory = Memory::with_balances([("c", 10), ("a", 50), ("b", 50), ("d", 0)]);
        let board = memory.top_n_by_balance(3).await.unwrap();
        let users: Vec<&str> = board.entries.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, vec!["a", "b", "c"]);
        assert!(Memory::new().top_n_by_balance(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_balances_applies_every_write() {
        let memory = Memory::with_balances([("a", 100), ("b", 100)]);
        memory
            .upsert_balances(&[
                BalanceWrite {
                    user: "a".to_string(),
                    before: 100,
                    after: 40,
                },
                BalanceWrite {
                    user: "b".to_string(),
                    before: 100,
                    after: 160,
                },
            ])
            .await
            .unwrap();
        assert_eq!(memory.balance("a"), Some(40));
        assert_eq!(memory.balance("b"), Some(160));
    }

    proptest! {
        #[test]
        fn prop_unseen_accounts_start_at_default(
            user in "[0-9]{1,20}",
            default in 0i64..1_000_000,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let memory = Memory::new();
            let first = runtime.block_on(memory.get_or_create(&user, default)).unwrap();
            prop_assert_eq!(first, default);
            prop_assert_eq!(memory.balance(&user), Some(default));
        }
    }
}
