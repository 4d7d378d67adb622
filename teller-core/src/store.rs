//! In-memory authoritative account store
//!
//! The store owns every [`Account`] record behind a per-account
//! `tokio::sync::Mutex`, with a registry mapping id to the shared handle.
//! All lock acquisitions use a bounded wait and fail with [`Error::Busy`]
//! on contention, so no operation blocks indefinitely. Whenever more than
//! one account lock is taken (transfers, full exports), locks are acquired
//! in ascending id order.
//!
//! The registry lock is a short synchronous critical section and is never
//! held across an `.await`.

use crate::credentials::PasswordHash;
use crate::error::{Error, Result};
use crate::types::{Account, AccountId, AccountSummary, TransactionKind, TransactionRecord};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Duration};

/// Shared handle to one account record
pub type SharedAccount = Arc<Mutex<Account>>;

/// Authoritative map of account id to account record
pub struct LedgerStore {
    accounts: RwLock<HashMap<AccountId, SharedAccount>>,
    max_amount: Decimal,
    history_capacity: usize,
    lock_wait: Duration,
}

impl LedgerStore {
    /// Build a store from a loaded account set
    pub fn new(
        accounts: BTreeMap<AccountId, Account>,
        max_amount: Decimal,
        history_capacity: usize,
        lock_wait: Duration,
    ) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|(id, account)| (id, Arc::new(Mutex::new(account))))
            .collect();

        Self {
            accounts: RwLock::new(accounts),
            max_amount,
            history_capacity,
            lock_wait,
        }
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// True when no accounts exist
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// True when the id is registered
    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.read().contains_key(id)
    }

    fn shared(&self, id: &AccountId) -> Result<SharedAccount> {
        self.accounts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))
    }

    async fn acquire(&self, shared: SharedAccount) -> Result<OwnedMutexGuard<Account>> {
        timeout(self.lock_wait, shared.lock_owned())
            .await
            .map_err(|_| Error::Busy("timed out waiting for account lock".to_string()))
    }

    /// Lock one account with a bounded wait
    ///
    /// A tombstoned record (removed while this caller still held the
    /// shared handle) reports `AccountNotFound`.
    pub async fn lock(&self, id: &AccountId) -> Result<OwnedMutexGuard<Account>> {
        let guard = self.acquire(self.shared(id)?).await?;
        if guard.closed {
            return Err(Error::AccountNotFound(id.to_string()));
        }
        Ok(guard)
    }

    /// Lock two distinct accounts, lower id first, with bounded waits
    ///
    /// Guards are returned in `(a, b)` argument order regardless of the
    /// acquisition order.
    pub async fn lock_pair(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> Result<(OwnedMutexGuard<Account>, OwnedMutexGuard<Account>)> {
        debug_assert_ne!(a, b, "lock_pair requires distinct accounts");

        let shared_a = self.shared(a)?;
        let shared_b = self.shared(b)?;

        let (guard_a, guard_b) = if a < b {
            let ga = self.acquire(shared_a).await?;
            let gb = self.acquire(shared_b).await?;
            (ga, gb)
        } else {
            let gb = self.acquire(shared_b).await?;
            let ga = self.acquire(shared_a).await?;
            (ga, gb)
        };

        if guard_a.closed {
            return Err(Error::AccountNotFound(a.to_string()));
        }
        if guard_b.closed {
            return Err(Error::AccountNotFound(b.to_string()));
        }

        Ok((guard_a, guard_b))
    }

    fn validated(&self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if amount.round_dp(2) != amount {
            return Err(Error::InvalidAmount(format!(
                "amount must have at most 2 decimal places, got {}",
                amount
            )));
        }
        Ok(amount)
    }

    /// Increase the balance of a locked account and append history
    pub fn credit(
        &self,
        account: &mut Account,
        amount: Decimal,
        kind: TransactionKind,
        counterparty: Option<String>,
    ) -> Result<Decimal> {
        let amount = self.validated(amount)?;
        if amount > self.max_amount {
            return Err(Error::LimitExceeded {
                amount,
                limit: self.max_amount,
            });
        }

        account.balance += amount;
        account.record(kind, counterparty, amount, self.history_capacity);
        Ok(account.balance)
    }

    /// Decrease the balance of a locked account and append history
    pub fn debit(
        &self,
        account: &mut Account,
        amount: Decimal,
        kind: TransactionKind,
        counterparty: Option<String>,
    ) -> Result<Decimal> {
        let amount = self.validated(amount)?;
        if amount > account.balance {
            return Err(Error::InsufficientFunds {
                requested: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        account.record(kind, counterparty, amount, self.history_capacity);
        Ok(account.balance)
    }

    /// Create a new account
    ///
    /// An `InitialDeposit` history entry is recorded when the opening
    /// balance is positive.
    pub fn create(
        &self,
        id: AccountId,
        holder: &str,
        initial_balance: Decimal,
        password: PasswordHash,
    ) -> Result<AccountSummary> {
        let holder = holder.trim();
        if holder.chars().count() < 2 {
            return Err(Error::InvalidName(format!(
                "name must be at least 2 characters, got {:?}",
                holder
            )));
        }
        if initial_balance < Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "initial balance cannot be negative, got {}",
                initial_balance
            )));
        }
        if initial_balance > Decimal::ZERO {
            self.validated(initial_balance)?;
        }

        let mut account = Account {
            id: id.clone(),
            holder: holder.to_string(),
            balance: initial_balance,
            password,
            history: VecDeque::new(),
            closed: false,
        };
        if initial_balance > Decimal::ZERO {
            account.record(
                TransactionKind::InitialDeposit,
                None,
                initial_balance,
                self.history_capacity,
            );
        }

        let summary = AccountSummary::from(&account);

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&id) {
            return Err(Error::DuplicateId(id.to_string()));
        }
        accounts.insert(id, Arc::new(Mutex::new(account)));

        Ok(summary)
    }

    /// Unlink an account from the registry
    ///
    /// The caller is expected to hold the account lock and to have set the
    /// tombstone flag; the returned handle allows reinsertion if the
    /// surrounding operation has to roll back.
    pub fn remove(&self, id: &AccountId) -> Result<SharedAccount> {
        self.accounts
            .write()
            .remove(id)
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))
    }

    /// Put a removed account back (rollback path)
    pub fn reinsert(&self, id: AccountId, shared: SharedAccount) {
        self.accounts.write().insert(id, shared);
    }

    /// Read-only snapshot of one account
    pub async fn summary(&self, id: &AccountId) -> Result<AccountSummary> {
        let guard = self.lock(id).await?;
        Ok(AccountSummary::from(&*guard))
    }

    /// Cloned history of one account, oldest first
    pub async fn history(&self, id: &AccountId) -> Result<Vec<TransactionRecord>> {
        let guard = self.lock(id).await?;
        Ok(guard.history.iter().cloned().collect())
    }

    /// Snapshots of every account, ordered by id
    pub async fn list_summaries(&self) -> Result<Vec<AccountSummary>> {
        let mut entries: Vec<(AccountId, SharedAccount)> = {
            let accounts = self.accounts.read();
            accounts
                .iter()
                .map(|(id, shared)| (id.clone(), shared.clone()))
                .collect()
        };
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut summaries = Vec::with_capacity(entries.len());
        for (_, shared) in entries {
            let guard = self.acquire(shared).await?;
            if !guard.closed {
                summaries.push(AccountSummary::from(&*guard));
            }
        }
        Ok(summaries)
    }

    /// Clone the full account set for persistence
    ///
    /// Accounts whose guards the caller already holds are read through
    /// those guards; every other account is locked transiently in
    /// ascending id order with the bounded wait.
    pub async fn export(&self, held: &[&Account]) -> Result<BTreeMap<AccountId, Account>> {
        let mut out = BTreeMap::new();
        for account in held {
            if !account.closed {
                out.insert(account.id.clone(), (*account).clone());
            }
        }

        let mut entries: Vec<(AccountId, SharedAccount)> = {
            let accounts = self.accounts.read();
            accounts
                .iter()
                .filter(|(id, _)| !out.contains_key(*id))
                .filter(|(id, _)| !held.iter().any(|h| &h.id == *id))
                .map(|(id, shared)| (id.clone(), shared.clone()))
                .collect()
        };
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (id, shared) in entries {
            let guard = self.acquire(shared).await?;
            if !guard.closed {
                out.insert(id, guard.clone());
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(id: &str, holder: &str, balance: Decimal) -> (AccountId, Account) {
        let id = AccountId::parse(id).unwrap();
        (
            id.clone(),
            Account {
                id,
                holder: holder.to_string(),
                balance,
                password: PasswordHash::derive("pass123"),
                history: VecDeque::new(),
                closed: false,
            },
        )
    }

    fn test_store() -> LedgerStore {
        let mut accounts = BTreeMap::new();
        let (id, acc) = account("1234", "Mos'ab", dec!(5000.00));
        accounts.insert(id, acc);
        let (id, acc) = account("5678", "Yamba boy", dec!(3000.00));
        accounts.insert(id, acc);

        LedgerStore::new(accounts, dec!(1_000_000), 50, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_credit_updates_balance_and_history() {
        let store = test_store();
        let id = AccountId::parse("1234").unwrap();

        let mut guard = store.lock(&id).await.unwrap();
        let balance = store
            .credit(&mut guard, dec!(500), TransactionKind::Deposit, None)
            .unwrap();
        assert_eq!(balance, dec!(5500.00));
        assert_eq!(guard.history.len(), 1);
        assert_eq!(guard.history[0].kind, TransactionKind::Deposit);
        assert_eq!(guard.history[0].balance_after, dec!(5500.00));
    }

    #[tokio::test]
    async fn test_credit_rejects_bad_amounts() {
        let store = test_store();
        let id = AccountId::parse("1234").unwrap();
        let mut guard = store.lock(&id).await.unwrap();

        let err = store
            .credit(&mut guard, dec!(0), TransactionKind::Deposit, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let err = store
            .credit(&mut guard, dec!(-5), TransactionKind::Deposit, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let err = store
            .credit(&mut guard, dec!(10.005), TransactionKind::Deposit, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let err = store
            .credit(&mut guard, dec!(1_000_000.01), TransactionKind::Deposit, None)
            .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { .. }));

        // No mutation on any failure
        assert_eq!(guard.balance, dec!(5000.00));
        assert!(guard.history.is_empty());
    }

    #[tokio::test]
    async fn test_debit_insufficient_funds_leaves_balance_unchanged() {
        let store = test_store();
        let id = AccountId::parse("5678").unwrap();
        let mut guard = store.lock(&id).await.unwrap();

        let err = store
            .debit(&mut guard, dec!(3000.01), TransactionKind::Withdrawal, None)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(guard.balance, dec!(3000.00));
        assert!(guard.history.is_empty());
    }

    #[tokio::test]
    async fn test_create_validations() {
        let store = test_store();

        let err = store
            .create(
                AccountId::parse("1234").unwrap(),
                "Someone",
                dec!(0),
                PasswordHash::derive("pass123"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));

        let err = store
            .create(
                AccountId::parse("9999").unwrap(),
                "  x ",
                dec!(0),
                PasswordHash::derive("pass123"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));

        let err = store
            .create(
                AccountId::parse("9999").unwrap(),
                "Valid Name",
                dec!(-1),
                PasswordHash::derive("pass123"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_create_records_initial_deposit() {
        let store = test_store();
        let id = AccountId::parse("4321").unwrap();

        let summary = store
            .create(id.clone(), "New Holder", dec!(250.00), PasswordHash::derive("secret99"))
            .unwrap();
        assert_eq!(summary.balance, dec!(250.00));
        assert_eq!(summary.transaction_count, 1);

        let history = store.history(&id).await.unwrap();
        assert_eq!(history[0].kind, TransactionKind::InitialDeposit);
        assert_eq!(history[0].balance_after, dec!(250.00));

        // Zero opening balance records nothing
        let summary = store
            .create(
                AccountId::parse("4322").unwrap(),
                "Other Holder",
                dec!(0),
                PasswordHash::derive("secret99"),
            )
            .unwrap();
        assert_eq!(summary.transaction_count, 0);
    }

    #[tokio::test]
    async fn test_lock_unknown_account() {
        let store = test_store();
        let err = store.lock(&AccountId::parse("0000").unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_lock_contention_reports_busy() {
        let store = test_store();
        let id = AccountId::parse("1234").unwrap();

        let _held = store.lock(&id).await.unwrap();
        let err = store.lock(&id).await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
    }

    #[tokio::test]
    async fn test_tombstoned_account_reports_not_found() {
        let store = test_store();
        let id = AccountId::parse("1234").unwrap();

        {
            let mut guard = store.lock(&id).await.unwrap();
            guard.closed = true;
            store.remove(&id).unwrap();
        }

        let err = store.lock(&id).await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_lock_pair_returns_argument_order() {
        let store = test_store();
        let a = AccountId::parse("5678").unwrap();
        let b = AccountId::parse("1234").unwrap();

        // Passed higher-first; guards still come back as (a, b)
        let (ga, gb) = store.lock_pair(&a, &b).await.unwrap();
        assert_eq!(ga.id, a);
        assert_eq!(gb.id, b);
    }

    #[tokio::test]
    async fn test_export_includes_held_and_skips_closed() {
        let store = test_store();
        let id = AccountId::parse("1234").unwrap();

        let mut guard = store.lock(&id).await.unwrap();
        store
            .credit(&mut guard, dec!(1), TransactionKind::Deposit, None)
            .unwrap();

        let exported = store.export(&[&guard]).await.unwrap();
        assert_eq!(exported.len(), 2);
        // Held guard's in-progress mutation is visible in the export
        assert_eq!(exported.get(&id).unwrap().balance, dec!(5001.00));

        guard.closed = true;
        let exported = store.export(&[&guard]).await.unwrap();
        assert_eq!(exported.len(), 1);
        assert!(!exported.contains_key(&id));
    }

    #[tokio::test]
    async fn test_list_summaries_sorted() {
        let store = test_store();
        store
            .create(
                AccountId::parse("0001").unwrap(),
                "First Holder",
                dec!(0),
                PasswordHash::derive("pass123"),
            )
            .unwrap();

        let summaries = store.list_summaries().await.unwrap();
        let ids: Vec<String> = summaries.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["0001", "1234", "5678"]);
    }
}
