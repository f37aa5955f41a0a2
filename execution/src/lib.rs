//! Coinhouse execution layer.
//!
//! This crate resolves decoded commands against a ledger: the [CommandRouter]
//! validates and authorizes each invocation, the [engine] decides its outcome,
//! and a [LedgerStore] persists the resulting balance changes.
//!
//! ## Invariants
//! - Every balance change comes from exactly one engine evaluation of exactly
//!   one invocation.
//! - A rejected command never writes.
//! - Mutations of one account are serialized in-process; a transfer holds both
//!   accounts' locks until both legs are written.
//! - Randomness comes only from the [SampleSource] passed to `resolve`.
//!
//! ## Resolving a command
//! ```rust
//! use coinhouse_execution::{AdminSet, CommandRouter, Memory, RngSampler};
//! use coinhouse_types::CommandInvocation;
//!
//! # async fn example() -> Result<(), coinhouse_execution::StoreError> {
//! let router = CommandRouter::new(Memory::new(), AdminSet::new(["1"]));
//! let invocation = CommandInvocation::new("balance", "42");
//! let outcome = router
//!     .resolve(&invocation, &mut RngSampler::from_entropy())
//!     .await?;
//! assert_eq!(outcome.message, "💰 <@42> has 1,000 coins.");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod engine;
pub mod error;
pub mod locks;
pub mod loot;
pub mod narrative;
pub mod retry;
pub mod rng;
pub mod router;
pub mod store;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


pub use auth::{AdminSet, Authorizer, Capability};
pub use error::{Rejection, StoreError, ValidationError};
pub use locks::AccountLocks;
pub use loot::{LootEntry, LootTable, STANDARD_LOOT};
pub use retry::RetryPolicy;
pub use rng::{RngSampler, SampleSource};
pub use router::{Command, CommandRouter, EngineConfig, Outcome, Verdict};
pub use store::{LedgerStore, Memory};
