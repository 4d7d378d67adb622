//! Session-aware command layer
//!
//! [`CommandRouter`] is the single entry point a front end talks to. It
//! owns the session gating (which commands need a logged-in account) and
//! translates commands into [`Bank`] operations. Front ends only ever see
//! [`CommandReply`] values and [`Error`]s, never internal records.

use crate::coordinator::Bank;
use crate::error::{Error, Result};
use crate::types::{AccountId, AccountSummary, TransactionRecord, TransferReceipt};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Login state of one front-end session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    /// No account authenticated
    #[default]
    LoggedOut,
    /// Authenticated as the given account
    LoggedIn(AccountId),
}

impl Session {
    fn current(&self) -> Result<&AccountId> {
        match self {
            Session::LoggedIn(id) => Ok(id),
            Session::LoggedOut => Err(Error::NotLoggedIn),
        }
    }
}

/// A request from a front end
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Authenticate and open a session
    Login { id: String, password: String },
    /// End the session
    Logout,
    /// Pay into the logged-in account
    Deposit { amount: Decimal },
    /// Pay out of the logged-in account
    Withdraw { amount: Decimal },
    /// Move money from the logged-in account to another
    Transfer { to: String, amount: Decimal },
    /// Open a new account (no session required)
    Register {
        id: String,
        name: String,
        password: String,
        initial_deposit: Decimal,
    },
    /// Snapshot of the logged-in account
    ViewAccount,
    /// History of the logged-in account
    ViewHistory,
    /// Snapshots of every account
    ListAccounts,
    /// Close the logged-in account after password re-verification
    CloseAccount { password: String },
}

/// The answer to a successfully executed [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Session opened
    LoggedIn(AccountSummary),
    /// Session ended
    LoggedOut,
    /// Balance after a deposit or withdrawal
    NewBalance(Decimal),
    /// Transfer outcome
    TransferCompleted(TransferReceipt),
    /// New account snapshot
    Registered(AccountSummary),
    /// Current account snapshot
    AccountView(AccountSummary),
    /// History entries, newest first
    History(Vec<TransactionRecord>),
    /// All account snapshots, ordered by id
    Accounts(Vec<AccountSummary>),
    /// Account closed; any remaining balance was forfeited
    AccountClosed {
        id: AccountId,
        forfeited: Decimal,
    },
}

/// Routes commands to the bank, enforcing session state
pub struct CommandRouter {
    bank: Arc<Bank>,
}

impl CommandRouter {
    pub fn new(bank: Arc<Bank>) -> Self {
        Self { bank }
    }

    /// Underlying bank
    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    /// Execute one command against the given session
    pub async fn dispatch(&self, session: &mut Session, command: Command) -> Result<CommandReply> {
        match command {
            Command::Login { id, password } => {
                if let Session::LoggedIn(current) = session {
                    return Err(Error::AlreadyLoggedIn(current.to_string()));
                }
                let id = AccountId::parse(id)?;
                let summary = self.bank.authenticate(&id, &password).await?;
                *session = Session::LoggedIn(id);
                Ok(CommandReply::LoggedIn(summary))
            }

            Command::Logout => {
                session.current()?;
                *session = Session::LoggedOut;
                Ok(CommandReply::LoggedOut)
            }

            Command::Deposit { amount } => {
                let id = session.current()?.clone();
                let balance = self.bank.deposit(&id, amount).await?;
                Ok(CommandReply::NewBalance(balance))
            }

            Command::Withdraw { amount } => {
                let id = session.current()?.clone();
                let balance = self.bank.withdraw(&id, amount).await?;
                Ok(CommandReply::NewBalance(balance))
            }

            Command::Transfer { to, amount } => {
                let from = session.current()?.clone();
                let to = AccountId::parse(to)?;
                let receipt = self.bank.transfer(&from, &to, amount).await?;
                Ok(CommandReply::TransferCompleted(receipt))
            }

            Command::Register {
                id,
                name,
                password,
                initial_deposit,
            } => {
                if let Session::LoggedIn(current) = session {
                    return Err(Error::AlreadyLoggedIn(current.to_string()));
                }
                let summary = self
                    .bank
                    .register(&id, &name, &password, initial_deposit)
                    .await?;
                Ok(CommandReply::Registered(summary))
            }

            Command::ViewAccount => {
                let id = session.current()?.clone();
                let summary = self.bank.account(&id).await?;
                Ok(CommandReply::AccountView(summary))
            }

            Command::ViewHistory => {
                let id = session.current()?.clone();
                let mut history = self.bank.history(&id).await?;
                history.reverse();
                Ok(CommandReply::History(history))
            }

            Command::ListAccounts => {
                let accounts = self.bank.list_accounts().await?;
                Ok(CommandReply::Accounts(accounts))
            }

            Command::CloseAccount { password } => {
                let id = session.current()?.clone();
                let forfeited = self.bank.close_account(&id, &password).await?;
                *session = Session::LoggedOut;
                Ok(CommandReply::AccountClosed { id, forfeited })
            }
        }
    }
}
