use thiserror::Error;

/// Malformed or out-of-range user input. Always rejects without mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("amount cannot be negative")]
    NegativeAmount,
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),
    #[error("invalid user")]
    InvalidUser,
    #[error("unknown game `{0}`")]
    UnknownGame(String),
    #[error("win rate must be between 0 and 1")]
    InvalidWinRate,
    #[error("cannot pay yourself")]
    SelfTransfer,
    #[error("too many chests (max {max})")]
    TooManyChests { max: i64 },
}

/// Expected, user-attributable reasons a command does not apply.
///
/// These never escape the router as errors; they are rendered into a
/// rejected [crate::Outcome].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("insufficient balance (required={required}, available={available})")]
    InsufficientFunds { required: i64, available: i64 },
    #[error("caller is not authorized")]
    Unauthorized,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
}

/// Ledger failures. Not user-attributable.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Worth retrying: the backend was busy or unreachable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger backend error: {0}")]
    Backend(String),
    /// A multi-account write failed and undoing the applied legs failed too.
    #[error("partial write, stranded accounts {stranded:?}: {source}")]
    PartialWrite {
        stranded: Vec<String>,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
