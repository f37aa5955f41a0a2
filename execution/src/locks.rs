//! Per-account mutation locks.
//!
//! Every read-check-write sequence against an account runs while holding that
//! account's lock. Multi-account sequences acquire all locks in sorted id
//! order, so two transfers touching the same pair can never deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries beyond this count trigger a sweep of idle locks.
const PRUNE_THRESHOLD: usize = 1_024;

#[derive(Debug, Default)]
pub struct AccountLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub struct AccountGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every listed account. Duplicates are locked once.
    pub async fn acquire(&self, users: &[&str]) -> AccountGuard {
        let mut ids: Vec<&str> = users.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let handles: Vec<Arc<AsyncMutex<()>>> = ids.iter().map(|id| self.handle(id)).collect();
        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        AccountGuard { _guards: guards }
    }

    /// Number of tracked accounts, held or idle.
    pub fn tracked(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn handle(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if table.len() >= PRUNE_THRESHOLD {
            // Only the table itself references an idle entry.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        table
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.acquire(&["a"]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&["a"]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquired lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.acquire(&["a"]).await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&["b"]))
            .await
            .expect("independent account");
    }

    #[tokio::test]
    async fn test_duplicate_ids_lock_once() {
        let locks = AccountLocks::new();
        let _guard = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&["a", "a"]))
            .await
            .expect("no self-deadlock");
        assert_eq!(locks.tracked(), 1);
    }

    #[tokio::test]
    async fn test_opposite_order_pairs_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());
        let mut tasks = Vec::new();
        for i in 0..50 {
            let locks = locks.clone();
            tasks.push(tokio::spawn(async move {
                let pair = if i % 2 == 0 { ["x", "y"] } else { ["y", "x"] };
                let _guard = locks.acquire(&pair).await;
                tokio::task::yield_now().await;
            }));
        }
        tokio::time::timeout(Duration::from_secs(5), futures::future::join_all(tasks))
            .await
            .expect("all transfers completed");
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = AccountLocks::new();
        for i in 0..PRUNE_THRESHOLD {
            let id = i.to_string();
            let _guard = locks.acquire(&[id.as_str()]).await;
        }
        assert_eq!(locks.tracked(), PRUNE_THRESHOLD);
        let _guard = locks.acquire(&["fresh"]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
