//! Error types for the account ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every validation failure is detected before any state change, so an
/// error return implies no observable mutation.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed account id (must be exactly 4 digits)
    #[error("Invalid account id: {0} (expected exactly 4 digits)")]
    InvalidId(String),

    /// Amount is not a valid operation amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount exceeds the configured per-operation maximum
    #[error("Limit exceeded: {amount} is above the maximum of {limit}")]
    LimitExceeded {
        /// Requested amount
        amount: Decimal,
        /// Configured maximum
        limit: Decimal,
    },

    /// Debit larger than the current balance
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Requested amount
        requested: Decimal,
        /// Current balance
        available: Decimal,
    },

    /// Account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account id already registered
    #[error("Account id already exists: {0}")]
    DuplicateId(String),

    /// Holder name empty or too short
    #[error("Invalid holder name: {0}")]
    InvalidName(String),

    /// Transfer rejected before touching either account
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Password did not match
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Too many failed authentication attempts in the current window
    #[error("Too many failed attempts, retry in {retry_after_secs}s")]
    TooManyAttempts {
        /// Seconds until the failure window rolls over
        retry_after_secs: u64,
    },

    /// Password rejected by the registration policy
    #[error("Password too weak: must be at least {min} characters")]
    WeakPassword {
        /// Minimum accepted length
        min: usize,
    },

    /// Command requires an authenticated session
    #[error("Not logged in")]
    NotLoggedIn,

    /// Command requires a logged-out session
    #[error("Already logged in as {0}")]
    AlreadyLoggedIn(String),

    /// Bounded lock wait expired (contention)
    #[error("Busy: {0}")]
    Busy(String),

    /// Durable state could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
