//! Signed webhook front end for the coinhouse economy.
//!
//! Verifies each request's Ed25519 signature, answers liveness handshakes,
//! decodes application commands, and hands them to the command router. No
//! economic logic lives here.

pub mod api;
pub mod config;
pub mod signature;
pub mod sqlite;

pub use api::{app, AppState};
pub use config::{Args, ConfigError, ValidatedConfig};
pub use signature::SignatureError;
pub use sqlite::SqliteLedger;
