//! Transaction coordinator
//!
//! [`Bank`] ties the credential store, ledger store and persistence layer
//! together into the atomic user-facing operations. Every mutating
//! operation follows the same pipeline:
//!
//! 1. acquire the writer permit (bounded wait, [`Error::Busy`] on contention)
//! 2. lock the affected account(s), lower id first
//! 3. validate, then mutate and append history
//! 4. export the full account set and flush it durably
//! 5. acknowledge
//!
//! Durability is persist-before-ack: if the flush fails, the in-memory
//! mutation is rolled back from a pre-mutation snapshot and the error is
//! returned, so no acknowledged operation can be lost and no failed
//! operation leaves partial state.

use crate::config::Config;
use crate::credentials::PasswordHash;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::persistence;
use crate::store::LedgerStore;
use crate::throttle::AuthThrottle;
use crate::types::{
    Account, AccountId, AccountSummary, TransactionKind, TransactionRecord, TransferReceipt,
};
use rust_decimal::Decimal;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{timeout, Duration};

/// The bank: validated, atomic operations over the account ledger
pub struct Bank {
    store: LedgerStore,
    config: Config,
    metrics: Metrics,
    throttle: AuthThrottle,
    /// Serializes the mutate-export-flush pipeline so concurrent writers
    /// cannot starve each other's exports
    writer: Mutex<()>,
    lock_wait: Duration,
}

impl Bank {
    /// Load (or seed) the account set and write the initial data file
    pub async fn open(config: Config) -> Result<Self> {
        if let Some(parent) = config.data_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let accounts = persistence::load_or_seed(&config).await?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("failed to build metrics: {}", e)))?;
        metrics.accounts.set(accounts.len() as i64);

        let lock_wait = Duration::from_millis(config.lock_wait_ms);
        let store = LedgerStore::new(
            accounts,
            config.max_amount,
            config.history_capacity,
            lock_wait,
        );

        let throttle = AuthThrottle::new(&config.auth);
        let bank = Self {
            store,
            config,
            metrics,
            throttle,
            writer: Mutex::new(()),
            lock_wait,
        };

        bank.flush(&[]).await?;
        tracing::info!(
            path = %bank.config.data_file.display(),
            accounts = bank.store.len(),
            "Bank opened"
        );
        Ok(bank)
    }

    /// Configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    async fn write_permit(&self) -> Result<MutexGuard<'_, ()>> {
        timeout(self.lock_wait, self.writer.lock())
            .await
            .map_err(|_| Error::Busy("timed out waiting for writer".to_string()))
    }

    /// Export the account set and flush it to the data file
    async fn flush(&self, held: &[&Account]) -> Result<()> {
        let snapshot = self.store.export(held).await?;
        let start = Instant::now();
        match persistence::save(&self.config.data_file, &snapshot).await {
            Ok(()) => {
                self.metrics
                    .record_persist_duration(start.elapsed().as_secs_f64());
                Ok(())
            }
            Err(e) => {
                self.metrics.persist_failures_total.inc();
                tracing::error!(error = %e, "Durable flush failed");
                Err(e)
            }
        }
    }

    /// Deposit into an account, returning the new balance
    pub async fn deposit(&self, id: &AccountId, amount: Decimal) -> Result<Decimal> {
        let _writer = self.write_permit().await?;
        let mut account = self.store.lock(id).await?;
        let rollback = account.clone();

        let balance = self
            .store
            .credit(&mut account, amount, TransactionKind::Deposit, None)?;

        if let Err(e) = self.flush(&[&account]).await {
            *account = rollback;
            return Err(e);
        }

        self.metrics.deposits_total.inc();
        tracing::info!(account = %id, %amount, %balance, "Deposit applied");
        Ok(balance)
    }

    /// Withdraw from an account, returning the new balance
    pub async fn withdraw(&self, id: &AccountId, amount: Decimal) -> Result<Decimal> {
        let _writer = self.write_permit().await?;
        let mut account = self.store.lock(id).await?;
        let rollback = account.clone();

        let balance = self
            .store
            .debit(&mut account, amount, TransactionKind::Withdrawal, None)?;

        if let Err(e) = self.flush(&[&account]).await {
            *account = rollback;
            return Err(e);
        }

        self.metrics.withdrawals_total.inc();
        tracing::info!(account = %id, %amount, %balance, "Withdrawal applied");
        Ok(balance)
    }

    /// Move money between two accounts atomically
    ///
    /// Either both sides mutate and both history entries are recorded, or
    /// neither account changes.
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        if from == to {
            return Err(Error::InvalidTransfer(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let _writer = self.write_permit().await?;
        let (mut src, mut dst) = self.store.lock_pair(from, to).await?;
        let rollback_src = src.clone();
        let rollback_dst = dst.clone();

        let from_balance = self.store.debit(
            &mut src,
            amount,
            TransactionKind::TransferOut,
            Some(dst.holder.clone()),
        )?;

        let to_balance = match self.store.credit(
            &mut dst,
            amount,
            TransactionKind::TransferIn,
            Some(src.holder.clone()),
        ) {
            Ok(balance) => balance,
            Err(e) => {
                *src = rollback_src;
                return Err(e);
            }
        };

        if let Err(e) = self.flush(&[&src, &dst]).await {
            *src = rollback_src;
            *dst = rollback_dst;
            return Err(e);
        }

        let counterparty = dst.holder.clone();
        self.metrics.transfers_total.inc();
        tracing::info!(
            from = %from,
            to = %to,
            %amount,
            %from_balance,
            %to_balance,
            "Transfer completed"
        );
        Ok(TransferReceipt {
            from_balance,
            to_balance,
            counterparty,
        })
    }

    /// Register a new account
    pub async fn register(
        &self,
        id: &str,
        name: &str,
        password: &str,
        initial_deposit: Decimal,
    ) -> Result<AccountSummary> {
        let id = AccountId::parse(id)?;

        let min = self.config.auth.min_password_len;
        if password.chars().count() < min {
            return Err(Error::WeakPassword { min });
        }
        let hash = PasswordHash::derive(password);

        let _writer = self.write_permit().await?;
        let summary = self.store.create(id.clone(), name, initial_deposit, hash)?;

        if let Err(e) = self.flush(&[]).await {
            let _ = self.store.remove(&id);
            return Err(e);
        }

        self.metrics.registrations_total.inc();
        self.metrics.accounts.set(self.store.len() as i64);
        tracing::info!(account = %id, balance = %summary.balance, "Account registered");
        Ok(summary)
    }

    /// Close an account after password re-verification
    ///
    /// Irreversible; any remaining balance is forfeited (inherited design
    /// weakness, surfaced in the warning log and the returned amount).
    pub async fn close_account(&self, id: &AccountId, password: &str) -> Result<Decimal> {
        let _writer = self.write_permit().await?;
        let mut account = self.store.lock(id).await?;

        if !account.password.verify(password) {
            self.metrics.auth_failures_total.inc();
            tracing::warn!(account = %id, "Account closure rejected: wrong password");
            return Err(Error::AuthenticationFailed);
        }

        let forfeited = account.balance;
        account.closed = true;
        let shared = self.store.remove(id)?;

        if let Err(e) = self.flush(&[&account]).await {
            account.closed = false;
            self.store.reinsert(id.clone(), shared);
            return Err(e);
        }

        self.metrics.closures_total.inc();
        self.metrics.accounts.set(self.store.len() as i64);
        if forfeited > Decimal::ZERO {
            tracing::warn!(
                account = %id,
                balance = %forfeited,
                "Account closed with remaining balance; funds forfeited"
            );
        } else {
            tracing::info!(account = %id, "Account closed");
        }
        Ok(forfeited)
    }

    /// Verify credentials without mutating any state
    ///
    /// Failures are audit-logged and throttled per account id.
    pub async fn authenticate(&self, id: &AccountId, password: &str) -> Result<AccountSummary> {
        self.throttle.check(id)?;

        let account = self.store.lock(id).await?;
        if account.password.verify(password) {
            self.throttle.clear(id);
            Ok(AccountSummary::from(&*account))
        } else {
            drop(account);
            self.throttle.record_failure(id);
            self.metrics.auth_failures_total.inc();
            tracing::warn!(account = %id, "Authentication failed");
            Err(Error::AuthenticationFailed)
        }
    }

    /// Read-only snapshot of one account
    pub async fn account(&self, id: &AccountId) -> Result<AccountSummary> {
        self.store.summary(id).await
    }

    /// History of one account, oldest first
    pub async fn history(&self, id: &AccountId) -> Result<Vec<TransactionRecord>> {
        self.store.history(id).await
    }

    /// Snapshots of every account, ordered by id
    pub async fn list_accounts(&self) -> Result<Vec<AccountSummary>> {
        self.store.list_summaries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn test_bank() -> (Bank, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_file = dir.path().join("accounts.json");
        config.lock_wait_ms = 200;
        let bank = Bank::open(config).await.unwrap();
        (bank, dir)
    }

    fn id(s: &str) -> AccountId {
        AccountId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_seeds_and_writes_file() {
        let (bank, _dir) = test_bank().await;

        let accounts = bank.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, id("1234"));
        assert_eq!(accounts[0].balance, dec!(5000.00));
        assert_eq!(accounts[1].balance, dec!(3000.00));
        assert!(bank.config().data_file.exists());
    }

    #[tokio::test]
    async fn test_deposit_scenario() {
        // Seed account 1234 at 5000.00; deposit 500 -> 5500.00 with one
        // new Deposit history entry
        let (bank, _dir) = test_bank().await;

        let balance = bank.deposit(&id("1234"), dec!(500)).await.unwrap();
        assert_eq!(balance, dec!(5500.00));

        let history = bank.history(&id("1234")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
        assert_eq!(history[0].amount, dec!(500));
        assert_eq!(history[0].balance_after, dec!(5500.00));
    }

    #[tokio::test]
    async fn test_deposit_then_withdraw_restores_balance() {
        let (bank, _dir) = test_bank().await;

        bank.deposit(&id("1234"), dec!(123.45)).await.unwrap();
        let balance = bank.withdraw(&id("1234"), dec!(123.45)).await.unwrap();
        assert_eq!(balance, dec!(5000.00));
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_no_state_change() {
        let (bank, _dir) = test_bank().await;

        let err = bank.withdraw(&id("5678"), dec!(3000.01)).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        let summary = bank.account(&id("5678")).await.unwrap();
        assert_eq!(summary.balance, dec!(3000.00));
        assert_eq!(summary.transaction_count, 0);
    }

    #[tokio::test]
    async fn test_transfer_scenario() {
        // 5500/3000 -> transfer 1000 -> 4500/4000 with linked entries
        let (bank, _dir) = test_bank().await;
        bank.deposit(&id("1234"), dec!(500)).await.unwrap();

        let receipt = bank
            .transfer(&id("1234"), &id("5678"), dec!(1000))
            .await
            .unwrap();
        assert_eq!(receipt.from_balance, dec!(4500.00));
        assert_eq!(receipt.to_balance, dec!(4000.00));
        assert_eq!(receipt.counterparty, "Yamba boy");

        let out = bank.history(&id("1234")).await.unwrap();
        let entry = out.last().unwrap();
        assert_eq!(entry.kind, TransactionKind::TransferOut);
        assert_eq!(entry.counterparty.as_deref(), Some("Yamba boy"));

        let incoming = bank.history(&id("5678")).await.unwrap();
        let entry = incoming.last().unwrap();
        assert_eq!(entry.kind, TransactionKind::TransferIn);
        assert_eq!(entry.counterparty.as_deref(), Some("Mos'ab"));
    }

    #[tokio::test]
    async fn test_transfer_preserves_total() {
        let (bank, _dir) = test_bank().await;

        let before: Decimal = bank
            .list_accounts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.balance)
            .sum();

        bank.transfer(&id("1234"), &id("5678"), dec!(777.77))
            .await
            .unwrap();

        let after: Decimal = bank
            .list_accounts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.balance)
            .sum();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_transfer_to_self_rejected() {
        let (bank, _dir) = test_bank().await;

        let err = bank
            .transfer(&id("1234"), &id("1234"), dec!(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransfer(_)));

        let summary = bank.account(&id("1234")).await.unwrap();
        assert_eq!(summary.balance, dec!(5000.00));
        assert_eq!(summary.transaction_count, 0);
    }

    #[tokio::test]
    async fn test_transfer_unknown_recipient() {
        let (bank, _dir) = test_bank().await;

        let err = bank
            .transfer(&id("1234"), &id("0000"), dec!(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));

        let summary = bank.account(&id("1234")).await.unwrap();
        assert_eq!(summary.balance, dec!(5000.00));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_mutates_neither_side() {
        let (bank, _dir) = test_bank().await;

        let err = bank
            .transfer(&id("5678"), &id("1234"), dec!(3000.01))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        assert_eq!(bank.account(&id("1234")).await.unwrap().balance, dec!(5000.00));
        assert_eq!(bank.account(&id("5678")).await.unwrap().balance, dec!(3000.00));
        assert!(bank.history(&id("1234")).await.unwrap().is_empty());
        assert!(bank.history(&id("5678")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let (bank, _dir) = test_bank().await;

        let summary = bank
            .register("9999", "New Holder", "secret99", dec!(42.00))
            .await
            .unwrap();
        assert_eq!(summary.balance, dec!(42.00));
        assert_eq!(summary.transaction_count, 1);

        let history = bank.history(&id("9999")).await.unwrap();
        assert_eq!(history[0].kind, TransactionKind::InitialDeposit);

        let err = bank
            .register("9999", "Other Holder", "secret99", dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
        assert_eq!(bank.list_accounts().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_register_validations() {
        let (bank, _dir) = test_bank().await;

        let err = bank
            .register("12ab", "Name", "secret99", dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidId(_)));

        let err = bank
            .register("9999", "Name", "short", dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WeakPassword { min: 6 }));

        let err = bank
            .register("9999", "N", "secret99", dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));

        assert_eq!(bank.list_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (bank, _dir) = test_bank().await;

        let summary = bank.authenticate(&id("1234"), "pass123").await.unwrap();
        assert_eq!(summary.id, id("1234"));
        assert_eq!(summary.holder, "Mos'ab");

        let err = bank.authenticate(&id("1234"), "wrong").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
        assert_eq!(bank.metrics().auth_failures_total.get(), 1);

        let err = bank.authenticate(&id("0000"), "pass123").await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_authenticate_throttled_after_repeated_failures() {
        let (bank, _dir) = test_bank().await;
        let max = bank.config().auth.max_failures;

        for _ in 0..max {
            let err = bank.authenticate(&id("1234"), "wrong").await.unwrap_err();
            assert!(matches!(err, Error::AuthenticationFailed));
        }

        // Even the correct password is refused while the window is hot
        let err = bank.authenticate(&id("1234"), "pass123").await.unwrap_err();
        assert!(matches!(err, Error::TooManyAttempts { .. }));
    }

    #[tokio::test]
    async fn test_close_account() {
        let (bank, _dir) = test_bank().await;

        let err = bank.close_account(&id("1234"), "wrong").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
        assert_eq!(bank.list_accounts().await.unwrap().len(), 2);

        let forfeited = bank.close_account(&id("1234"), "pass123").await.unwrap();
        assert_eq!(forfeited, dec!(5000.00));
        assert_eq!(bank.list_accounts().await.unwrap().len(), 1);

        let err = bank.account(&id("1234")).await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_file = dir.path().join("accounts.json");

        {
            let bank = Bank::open(config.clone()).await.unwrap();
            bank.deposit(&id("1234"), dec!(500)).await.unwrap();
            bank.transfer(&id("1234"), &id("5678"), dec!(1000))
                .await
                .unwrap();
        }

        let bank = Bank::open(config).await.unwrap();
        assert_eq!(bank.account(&id("1234")).await.unwrap().balance, dec!(4500.00));
        assert_eq!(bank.account(&id("5678")).await.unwrap().balance, dec!(4000.00));

        let history = bank.history(&id("1234")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind, TransactionKind::TransferOut);
        assert!(bank.authenticate(&id("1234"), "pass123").await.is_ok());
    }

    #[tokio::test]
    async fn test_flush_failure_rolls_back_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("data");
        let mut config = Config::default();
        config.data_file = sub.join("accounts.json");

        let bank = Bank::open(config).await.unwrap();

        // Make the data directory disappear so the next flush must fail
        std::fs::remove_dir_all(&sub).unwrap();

        let err = bank.deposit(&id("1234"), dec!(500)).await.unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::Persistence(_)));

        // In-memory state rolled back, nothing acknowledged without durability
        let summary = bank.account(&id("1234")).await.unwrap();
        assert_eq!(summary.balance, dec!(5000.00));
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(bank.metrics().persist_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_history_capped_at_fifty() {
        let (bank, _dir) = test_bank().await;

        for _ in 0..60 {
            bank.deposit(&id("1234"), dec!(1)).await.unwrap();
        }

        let history = bank.history(&id("1234")).await.unwrap();
        assert_eq!(history.len(), 50);
        // Oldest evicted: the first retained entry is the 11th deposit
        assert_eq!(history[0].balance_after, dec!(5011.00));
    }
}
