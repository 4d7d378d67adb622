//! Teller Core
//!
//! Single-process account ledger with durable JSON persistence.
//!
//! # Architecture
//!
//! - **Exact money**: `Decimal` balances, 2-decimal amounts, no floats
//! - **Per-account locking**: bounded waits, lower-id-first ordering
//! - **Persist-before-ack**: a mutation is acknowledged only after the
//!   full account set has been flushed durably; failed flushes roll back
//! - **Session gating**: front ends drive a [`commands::CommandRouter`],
//!   never the stores directly
//!
//! # Invariants
//!
//! - Balances never go negative
//! - Transfers conserve the total: both sides mutate or neither does
//! - History is bounded per account, oldest entries evicted first
//! - The data file always holds a complete, consistent account set

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod store;
pub mod throttle;
pub mod types;

// Re-exports
pub use commands::{Command, CommandReply, CommandRouter, Session};
pub use config::Config;
pub use coordinator::Bank;
pub use error::{Error, Result};
pub use types::{
    Account, AccountId, AccountSummary, TransactionKind, TransactionRecord, TransferReceipt,
};
