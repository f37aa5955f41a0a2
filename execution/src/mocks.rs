//! Test doubles for the engine and the ledger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use coinhouse_types::Leaderboard;

use crate::error::StoreError;
use crate::rng::SampleSource;
use crate::store::LedgerStore;

/// Replays a fixed sequence of samples, cycling when exhausted.
#[derive(Clone, Debug)]
pub struct FixedSamples {
    samples: Vec<f64>,
    drawn: usize,
}

impl FixedSamples {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        let samples: Vec<f64> = samples.into_iter().collect();
        assert!(!samples.is_empty(), "FixedSamples needs at least one sample");
        Self { samples, drawn: 0 }
    }

    pub fn repeat(sample: f64) -> Self {
        Self::new([sample])
    }

    /// Samples handed out so far.
    pub fn drawn(&self) -> usize {
        self.drawn
    }
}

impl SampleSource for FixedSamples {
    fn sample(&mut self) -> f64 {
        let sample = self.samples[self.drawn % self.samples.len()];
        self.drawn += 1;
        sample
    }
}

#[derive(Clone, Copy, Debug)]
enum WriteRule {
    /// Every write to the account fails.
    Broken,
    /// This many more writes succeed, then every write fails.
    Budget(u32),
}

/// Wraps a ledger and injects failures.
///
/// Only single-account writes are forwarded, so multi-account writes go
/// through the trait's sequential rollback path.
#[derive(Debug)]
pub struct FlakyLedger<S> {
    inner: S,
    transient: AtomicU32,
    rules: Mutex<HashMap<String, WriteRule>>,
    calls: AtomicU32,
}

impl<S: LedgerStore> FlakyLedger<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            transient: AtomicU32::new(0),
            rules: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `n` calls of any kind with [StoreError::Unavailable].
    pub fn fail_next(&self, n: u32) {
        self.transient.store(n, Ordering::SeqCst);
    }

    /// Fail every write to `user` with [StoreError::Backend].
    pub fn break_writes_for(&self, user: &str) {
        self.rules().insert(user.to_string(), WriteRule::Broken);
    }

    /// Let `n` more writes to `user` succeed, then fail the rest.
    pub fn limit_writes_for(&self, user: &str, n: u32) {
        self.rules().insert(user.to_string(), WriteRule::Budget(n));
    }

    /// Calls received, including failed ones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn rules(&self) -> std::sync::MutexGuard<'_, HashMap<String, WriteRule>> {
        self.rules.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .transient
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }

    fn check_write(&self, user: &str) -> Result<(), StoreError> {
        let mut rules = self.rules();
        match rules.get_mut(user) {
            None => Ok(()),
            Some(WriteRule::Broken) | Some(WriteRule::Budget(0)) => {
                Err(StoreError::Backend(format!("write to {user} rejected")))
            }
            Some(WriteRule::Budget(remaining)) => {
                *remaining -= 1;
                Ok(())
            }
        }
    }
}

impl<S: LedgerStore> LedgerStore for FlakyLedger<S> {
    async fn get_or_create(&self, user: &str, default: i64) -> Result<i64, StoreError> {
        self.enter()?;
        self.inner.get_or_create(user, default).await
    }

    async fn upsert_balance(&self, user: &str, balance: i64) -> Result<(), StoreError> {
        self.enter()?;
        self.check_write(user)?;
        self.inner.upsert_balance(user, balance).await
    }

    async fn top_n_by_balance(&self, n: usize) -> Result<Leaderboard, StoreError> {
        self.enter()?;
        self.inner.top_n_by_balance(n).await
    }

    async fn get_or_create_winrate(&self, game: &str, default: f64) -> Result<f64, StoreError> {
        self.enter()?;
        self.inner.get_or_create_winrate(game, default).await
    }

    async fn set_winrate(&self, game: &str, rate: f64) -> Result<(), StoreError> {
        self.enter()?;
        self.inner.set_winrate(game, rate).await
    }
}
