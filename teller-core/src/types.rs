//! Core types for the account ledger
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money, 2-decimal precision)
//! - Read-only snapshots at the API boundary (internal records never escape)
//! - Stable on-disk representation (see `persistence`)

use crate::credentials::PasswordHash;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Account identifier: exactly four ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Parse and validate an account id
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() == 4 && id.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(id))
        } else {
            Err(Error::InvalidId(id))
        }
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of balance-changing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Cash paid in
    Deposit,
    /// Cash paid out
    Withdrawal,
    /// Opening balance recorded at registration
    InitialDeposit,
    /// Outgoing side of a transfer
    TransferOut,
    /// Incoming side of a transfer
    TransferIn,
}

impl TransactionKind {
    /// Build the on-disk `type` label, naming the counterparty for transfers
    pub fn label(&self, counterparty: Option<&str>) -> String {
        match self {
            TransactionKind::Deposit => "Deposit".to_string(),
            TransactionKind::Withdrawal => "Withdrawal".to_string(),
            TransactionKind::InitialDeposit => "Initial Deposit".to_string(),
            TransactionKind::TransferOut => {
                format!("Transfer to {}", counterparty.unwrap_or("unknown"))
            }
            TransactionKind::TransferIn => {
                format!("Transfer from {}", counterparty.unwrap_or("unknown"))
            }
        }
    }

    /// Parse an on-disk `type` label back into kind and counterparty
    pub fn parse_label(label: &str) -> Option<(Self, Option<String>)> {
        match label {
            "Deposit" => Some((TransactionKind::Deposit, None)),
            "Withdrawal" => Some((TransactionKind::Withdrawal, None)),
            "Initial Deposit" => Some((TransactionKind::InitialDeposit, None)),
            _ => {
                if let Some(name) = label.strip_prefix("Transfer to ") {
                    Some((TransactionKind::TransferOut, Some(name.to_string())))
                } else {
                    label
                        .strip_prefix("Transfer from ")
                        .map(|name| (TransactionKind::TransferIn, Some(name.to_string())))
                }
            }
        }
    }
}

/// One immutable balance-changing event in an account's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// When the event was applied (UTC, second precision on disk)
    pub timestamp: DateTime<Utc>,

    /// What happened
    pub kind: TransactionKind,

    /// Holder name on the other side of a transfer
    pub counterparty: Option<String>,

    /// Amount moved (always positive)
    pub amount: Decimal,

    /// Balance immediately after the event
    pub balance_after: Decimal,
}

/// Internal account record
///
/// Owned exclusively by the ledger store; callers only ever see
/// [`AccountSummary`] snapshots or cloned history entries.
#[derive(Debug, Clone)]
pub struct Account {
    /// Immutable account id
    pub id: AccountId,

    /// Holder name (trimmed, at least 2 characters)
    pub holder: String,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Password verifier
    pub password: PasswordHash,

    /// Bounded history, oldest first, FIFO eviction at capacity
    pub history: VecDeque<TransactionRecord>,

    /// Set when the account has been removed; in-flight handles must
    /// treat the account as gone
    pub closed: bool,
}

impl Account {
    /// Append a history entry, evicting the oldest beyond `capacity`
    pub fn record(
        &mut self,
        kind: TransactionKind,
        counterparty: Option<String>,
        amount: Decimal,
        capacity: usize,
    ) {
        self.history.push_back(TransactionRecord {
            timestamp: Utc::now(),
            kind,
            counterparty,
            amount,
            balance_after: self.balance,
        });
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }
}

/// Read-only account snapshot returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Account id
    pub id: AccountId,

    /// Holder name
    pub holder: String,

    /// Balance at snapshot time
    pub balance: Decimal,

    /// Number of retained history entries
    pub transaction_count: usize,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            holder: account.holder.clone(),
            balance: account.balance,
            transaction_count: account.history.len(),
        }
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Sender balance after the transfer
    pub from_balance: Decimal,

    /// Recipient balance after the transfer
    pub to_balance: Decimal,

    /// Recipient holder name
    pub counterparty: String,
}
