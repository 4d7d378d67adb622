//! Configuration for the bank

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bank configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the durable account file
    pub data_file: PathBuf,

    /// Maximum amount accepted by a single credit
    pub max_amount: Decimal,

    /// Retained history entries per account
    pub history_capacity: usize,

    /// Bounded wait for account and writer locks (milliseconds)
    pub lock_wait_ms: u64,

    /// Authentication throttling
    pub auth: AuthConfig,

    /// Accounts created when no data file exists
    pub seed_accounts: Vec<SeedAccount>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("./data/accounts.json"),
            max_amount: dec!(1_000_000),
            history_capacity: 50,
            lock_wait_ms: 2_000,
            auth: AuthConfig::default(),
            seed_accounts: vec![
                SeedAccount {
                    id: "1234".to_string(),
                    name: "Mos'ab".to_string(),
                    balance: dec!(5000.00),
                    password: "pass123".to_string(),
                },
                SeedAccount {
                    id: "5678".to_string(),
                    name: "Yamba boy".to_string(),
                    balance: dec!(3000.00),
                    password: "word567".to_string(),
                },
            ],
        }
    }
}

/// Authentication throttling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Failed attempts tolerated per window
    pub max_failures: u32,

    /// Failure window (seconds)
    pub window_secs: u64,

    /// Minimum password length at registration
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window_secs: 60,
            min_password_len: 6,
        }
    }
}

/// An account seeded on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    /// 4-digit account id
    pub id: String,

    /// Holder name
    pub name: String,

    /// Opening balance
    pub balance: Decimal,

    /// Plaintext password, hashed at seed time
    pub password: String,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults, overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_file) = std::env::var("TELLER_DATA_FILE") {
            config.data_file = PathBuf::from(data_file);
        }

        if let Ok(wait) = std::env::var("TELLER_LOCK_WAIT_MS") {
            config.lock_wait_ms = wait
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid TELLER_LOCK_WAIT_MS: {}", wait)))?;
        }

        Ok(config)
    }
}
