//! Durable storage for the account set
//!
//! The full account map is serialized to a single JSON file in the shape
//! the original data files used: id -> `{ name, balance, password,
//! transactions: [{date, type, amount, balance}] }`. Timestamps are
//! `"YYYY-MM-DD HH:MM:SS"` (UTC) and money fields are exact decimal
//! strings with two places; the loader also accepts plain JSON numbers so
//! files written by the float-based predecessor still load.
//!
//! Writes are atomic: serialize to a temp file in the target directory,
//! fsync, then rename over the old file. A crash mid-write leaves the
//! previous file intact.

use crate::config::Config;
use crate::credentials::PasswordHash;
use crate::error::{Error, Result};
use crate::types::{Account, AccountId, TransactionKind, TransactionRecord};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// On-disk account record
#[derive(Debug, Serialize, Deserialize)]
struct StoredAccount {
    name: String,
    balance: Decimal,
    password: String,
    #[serde(default)]
    transactions: Vec<StoredTransaction>,
}

/// On-disk history entry
#[derive(Debug, Serialize, Deserialize)]
struct StoredTransaction {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    amount: Decimal,
    balance: Decimal,
}

fn two_places(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

impl From<&Account> for StoredAccount {
    fn from(account: &Account) -> Self {
        Self {
            name: account.holder.clone(),
            balance: two_places(account.balance),
            password: account.password.as_str().to_string(),
            transactions: account
                .history
                .iter()
                .map(|record| StoredTransaction {
                    date: record.timestamp.format(DATE_FORMAT).to_string(),
                    kind: record.kind.label(record.counterparty.as_deref()),
                    amount: two_places(record.amount),
                    balance: two_places(record.balance_after),
                })
                .collect(),
        }
    }
}

fn restore_account(id: AccountId, stored: StoredAccount, capacity: usize) -> Result<Account> {
    if stored.balance < Decimal::ZERO {
        return Err(Error::Persistence(format!(
            "account {} has negative balance {}",
            id, stored.balance
        )));
    }

    let mut history = VecDeque::with_capacity(stored.transactions.len().min(capacity));
    for tx in stored.transactions {
        let timestamp = NaiveDateTime::parse_from_str(&tx.date, DATE_FORMAT)
            .map_err(|e| Error::Persistence(format!("bad transaction date {:?}: {}", tx.date, e)))?
            .and_utc();
        let (kind, counterparty) = TransactionKind::parse_label(&tx.kind).ok_or_else(|| {
            Error::Persistence(format!("unknown transaction type {:?}", tx.kind))
        })?;
        history.push_back(TransactionRecord {
            timestamp,
            kind,
            counterparty,
            amount: two_places(tx.amount),
            balance_after: two_places(tx.balance),
        });
    }
    while history.len() > capacity {
        history.pop_front();
    }

    Ok(Account {
        id,
        holder: stored.name,
        balance: two_places(stored.balance),
        password: PasswordHash::from_stored(stored.password),
        history,
        closed: false,
    })
}

/// Strict load: `Ok(None)` when the file does not exist, error when it
/// cannot be read or parsed
pub async fn load(path: &Path, capacity: usize) -> Result<Option<BTreeMap<AccountId, Account>>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let stored: BTreeMap<String, StoredAccount> = serde_json::from_str(&content)?;

    let mut accounts = BTreeMap::new();
    for (raw_id, stored_account) in stored {
        let id = AccountId::parse(raw_id)?;
        let account = restore_account(id.clone(), stored_account, capacity)?;
        accounts.insert(id, account);
    }

    Ok(Some(accounts))
}

/// Load the account set, falling back to the configured seed accounts
/// when the file is absent or unusable
pub async fn load_or_seed(config: &Config) -> Result<BTreeMap<AccountId, Account>> {
    match load(&config.data_file, config.history_capacity).await {
        Ok(Some(accounts)) => {
            tracing::info!(
                path = %config.data_file.display(),
                accounts = accounts.len(),
                "Loaded account data"
            );
            Ok(accounts)
        }
        Ok(None) => {
            tracing::info!(
                path = %config.data_file.display(),
                "No data file found, creating seed accounts"
            );
            seed_accounts(config)
        }
        Err(e) => {
            tracing::warn!(
                path = %config.data_file.display(),
                error = %e,
                "Data file unreadable, falling back to seed accounts"
            );
            seed_accounts(config)
        }
    }
}

/// Build the configured seed account set
pub fn seed_accounts(config: &Config) -> Result<BTreeMap<AccountId, Account>> {
    let mut accounts = BTreeMap::new();
    for seed in &config.seed_accounts {
        let id = AccountId::parse(seed.id.clone())
            .map_err(|_| Error::Config(format!("invalid seed account id: {}", seed.id)))?;
        accounts.insert(
            id.clone(),
            Account {
                id,
                holder: seed.name.clone(),
                balance: two_places(seed.balance),
                password: PasswordHash::derive(&seed.password),
                history: VecDeque::new(),
                closed: false,
            },
        );
    }
    Ok(accounts)
}

/// Atomically replace the data file with the given account set
pub async fn save(path: &Path, accounts: &BTreeMap<AccountId, Account>) -> Result<()> {
    let stored: BTreeMap<String, StoredAccount> = accounts
        .iter()
        .map(|(id, account)| (id.to_string(), StoredAccount::from(account)))
        .collect();
    let json = serde_json::to_string_pretty(&stored)?;

    let path: PathBuf = path.to_path_buf();
    let count = accounts.len();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| Error::Persistence(format!("atomic rename failed: {}", e)))?;

        tracing::debug!(path = %path.display(), accounts = count, "Account data flushed");
        Ok(())
    })
    .await
    .map_err(|e| Error::Persistence(format!("write task failed: {}", e)))?
}
