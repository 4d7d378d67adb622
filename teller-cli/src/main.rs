//! Interactive teller console
//!
//! Line-oriented front end over [`teller_core::CommandRouter`]. One
//! session per process; type `help` for the command list.

use anyhow::Context;
use rust_decimal::Decimal;
use std::io::{BufRead, Write};
use std::sync::Arc;
use teller_core::{
    Bank, Command, CommandReply, CommandRouter, Config, Error, Session, TransactionKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let config = match std::env::var("TELLER_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => Config::from_env().context("failed to build config from environment")?,
    };

    let bank = Bank::open(config).await.context("failed to open bank")?;
    let router = CommandRouter::new(Arc::new(bank));
    let mut session = Session::default();

    println!("Teller console. Type 'help' for commands.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        prompt(&session)?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if words[0] == "exit" || words[0] == "quit" {
            break;
        }
        if words[0] == "help" {
            print_help();
            continue;
        }

        match parse_command(&words) {
            Ok(command) => match router.dispatch(&mut session, command).await {
                Ok(reply) => print_reply(&reply),
                Err(e) => print_error(&e),
            },
            Err(usage) => println!("usage: {}", usage),
        }
    }

    println!("Goodbye.");
    Ok(())
}

fn prompt(session: &Session) -> anyhow::Result<()> {
    match session {
        Session::LoggedIn(id) => print!("teller[{}]> ", id),
        Session::LoggedOut => print!("teller> "),
    }
    std::io::stdout().flush()?;
    Ok(())
}

fn print_help() {
    println!("  login <id> <password>                 open a session");
    println!("  logout                                end the session");
    println!("  deposit <amount>                      pay into your account");
    println!("  withdraw <amount>                     pay out of your account");
    println!("  transfer <id> <amount>                send money to another account");
    println!("  register <id> <name..> <password> <initial>  open a new account");
    println!("  account                               show your account");
    println!("  history                               show your transactions, newest first");
    println!("  accounts                              list all accounts");
    println!("  close <password>                      close your account (irreversible)");
    println!("  exit                                  quit");
}

/// Parse one input line into a command, or return a usage string
fn parse_command(words: &[&str]) -> Result<Command, &'static str> {
    match words[0] {
        "login" => match words {
            [_, id, password] => Ok(Command::Login {
                id: id.to_string(),
                password: password.to_string(),
            }),
            _ => Err("login <id> <password>"),
        },
        "logout" => Ok(Command::Logout),
        "deposit" => match words {
            [_, amount] => Ok(Command::Deposit {
                amount: parse_amount(amount)?,
            }),
            _ => Err("deposit <amount>"),
        },
        "withdraw" => match words {
            [_, amount] => Ok(Command::Withdraw {
                amount: parse_amount(amount)?,
            }),
            _ => Err("withdraw <amount>"),
        },
        "transfer" => match words {
            [_, to, amount] => Ok(Command::Transfer {
                to: to.to_string(),
                amount: parse_amount(amount)?,
            }),
            _ => Err("transfer <id> <amount>"),
        },
        // The holder name may span several words
        "register" if words.len() >= 5 => {
            let id = words[1].to_string();
            let name = words[2..words.len() - 2].join(" ");
            let password = words[words.len() - 2].to_string();
            let initial_deposit = parse_amount(words[words.len() - 1])?;
            Ok(Command::Register {
                id,
                name,
                password,
                initial_deposit,
            })
        }
        "register" => Err("register <id> <name..> <password> <initial>"),
        "account" => Ok(Command::ViewAccount),
        "history" => Ok(Command::ViewHistory),
        "accounts" => Ok(Command::ListAccounts),
        "close" => match words {
            [_, password] => Ok(Command::CloseAccount {
                password: password.to_string(),
            }),
            _ => Err("close <password>"),
        },
        _ => Err("unknown command; type 'help'"),
    }
}

fn parse_amount(text: &str) -> Result<Decimal, &'static str> {
    text.parse().map_err(|_| "amount must be a decimal number")
}

fn print_reply(reply: &CommandReply) {
    match reply {
        CommandReply::LoggedIn(summary) => {
            println!("Welcome, {}. Balance: {:.2}", summary.holder, summary.balance);
        }
        CommandReply::LoggedOut => println!("Logged out."),
        CommandReply::NewBalance(balance) => println!("New balance: {:.2}", balance),
        CommandReply::TransferCompleted(receipt) => {
            println!(
                "Sent to {}. Your balance: {:.2}",
                receipt.counterparty, receipt.from_balance
            );
        }
        CommandReply::Registered(summary) => {
            println!(
                "Account {} opened for {}. Balance: {:.2}",
                summary.id, summary.holder, summary.balance
            );
        }
        CommandReply::AccountView(summary) => {
            println!(
                "Account {}  holder: {}  balance: {:.2}  transactions: {}",
                summary.id, summary.holder, summary.balance, summary.transaction_count
            );
        }
        CommandReply::History(entries) => {
            if entries.is_empty() {
                println!("No transactions.");
            }
            for entry in entries {
                let label = entry.kind.label(entry.counterparty.as_deref());
                println!(
                    "{}  {:<26}  {:>12.2}  balance {:.2}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    label,
                    signed_amount(entry),
                    entry.balance_after
                );
            }
        }
        CommandReply::Accounts(accounts) => {
            for account in accounts {
                println!(
                    "{}  {:<20}  {:>12.2}",
                    account.id, account.holder, account.balance
                );
            }
        }
        CommandReply::AccountClosed { id, forfeited } => {
            if forfeited > &Decimal::ZERO {
                println!("Account {} closed. Forfeited balance: {:.2}", id, forfeited);
            } else {
                println!("Account {} closed.", id);
            }
        }
    }
}

fn signed_amount(entry: &teller_core::TransactionRecord) -> Decimal {
    match entry.kind {
        TransactionKind::Deposit | TransactionKind::InitialDeposit | TransactionKind::TransferIn => {
            entry.amount
        }
        TransactionKind::Withdrawal | TransactionKind::TransferOut => -entry.amount,
    }
}

fn print_error(error: &Error) {
    match error {
        Error::Busy(_) => println!("The bank is busy; please try again."),
        other => println!("Error: {}", other),
    }
}
