//! Shared data model for the coinhouse economy.
//!
//! The execution crate resolves commands against these types and the webhook
//! service moves them across the wire.

pub mod command;
pub mod constants;
pub mod interaction;
pub mod ledger;

pub use command::{ArgValue, CommandInvocation};
pub use constants::*;
pub use interaction::{Interaction, InteractionKind, InteractionResponse};
pub use ledger::{Account, BalanceWrite, GameKind, Leaderboard, LeaderboardEntry};
