use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use coinhouse_execution::{AdminSet, EngineConfig};
use coinhouse_types::STARTING_BALANCE;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use crate::signature::{parse_public_key, SignatureError};

/// Hex-encoded Ed25519 key the calling platform signs requests with.
pub const PUBLIC_KEY_ENV: &str = "COINHOUSE_PUBLIC_KEY";
/// Comma separated administrator ids.
pub const ADMIN_IDS_ENV: &str = "COINHOUSE_ADMIN_IDS";
pub const STARTING_BALANCE_ENV: &str = "COINHOUSE_STARTING_BALANCE";

#[derive(Parser, Debug, Clone)]
#[command(name = "coinhouse-webhook", about = "Serve coinhouse commands over a signed webhook")]
pub struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Path to the SQLite ledger (in-memory ledger when omitted).
    #[arg(long)]
    pub ledger_path: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Seed for reproducible outcomes (optional).
    #[arg(long)]
    pub deterministic_seed: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    MissingEnv { key: &'static str },
    #[error("{key} is invalid: {source}")]
    InvalidPublicKey {
        key: &'static str,
        #[source]
        source: SignatureError,
    },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{key} must be a non-negative integer: {value}")]
    InvalidStartingBalance { key: &'static str, value: String },
}

#[derive(Debug)]
pub struct ValidatedConfig {
    pub addr: SocketAddr,
    pub ledger_path: Option<PathBuf>,
    pub log_level: tracing::Level,
    pub public_key: VerifyingKey,
    pub admins: AdminSet,
    pub engine: EngineConfig,
    pub deterministic_seed: Option<u64>,
}

impl Args {
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        self.validate_with(|key| std::env::var(key).ok())
    }

    /// Validate against an arbitrary environment lookup.
    pub fn validate_with<F>(&self, env: F) -> Result<ValidatedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = self
            .log_level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        let raw_key = env(PUBLIC_KEY_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingEnv {
                key: PUBLIC_KEY_ENV,
            })?;
        let public_key =
            parse_public_key(&raw_key).map_err(|source| ConfigError::InvalidPublicKey {
                key: PUBLIC_KEY_ENV,
                source,
            })?;

        let admins = AdminSet::new(
            env(ADMIN_IDS_ENV)
                .unwrap_or_default()
                .split(',')
                .map(str::to_string),
        );

        let starting_balance = match env(STARTING_BALANCE_ENV) {
            None => STARTING_BALANCE,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|value| *value >= 0)
                .ok_or(ConfigError::InvalidStartingBalance {
                    key: STARTING_BALANCE_ENV,
                    value: raw,
                })?,
        };

        Ok(ValidatedConfig {
            addr: SocketAddr::new(self.host, self.port),
            ledger_path: self.ledger_path.clone(),
            log_level,
            public_key,
            admins,
            engine: EngineConfig {
                starting_balance,
                ..EngineConfig::default()
            },
            deterministic_seed: self.deterministic_seed,
        })
    }
}
