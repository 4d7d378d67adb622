//! Authentication throttling
//!
//! Fixed-window failure counter per account id. Once an account exceeds
//! the configured number of failed authentications inside the window,
//! further attempts are refused until the window rolls over. A successful
//! authentication clears the counter.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::types::AccountId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct WindowEntry {
    failures: u32,
    window_start: Instant,
}

/// Per-account failed-login throttle
#[derive(Debug)]
pub struct AuthThrottle {
    max_failures: u32,
    window: Duration,
    entries: Mutex<HashMap<AccountId, WindowEntry>>,
}

impl AuthThrottle {
    /// Build from configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            max_failures: config.max_failures,
            window: Duration::from_secs(config.window_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether an attempt is allowed right now
    pub fn check(&self, id: &AccountId) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(id) {
            let elapsed = entry.window_start.elapsed();
            if elapsed >= self.window {
                entries.remove(id);
            } else if entry.failures >= self.max_failures {
                let retry_after = self.window - elapsed;
                return Err(Error::TooManyAttempts {
                    retry_after_secs: retry_after.as_secs().max(1),
                });
            }
        }
        Ok(())
    }

    /// Record a failed attempt
    pub fn record_failure(&self, id: &AccountId) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let entry = entries.entry(id.clone()).or_insert(WindowEntry {
            failures: 0,
            window_start: now,
        });
        if entry.window_start.elapsed() >= self.window {
            entry.failures = 0;
            entry.window_start = now;
        }
        entry.failures += 1;
    }

    /// Clear the counter after a successful authentication
    pub fn clear(&self, id: &AccountId) {
        self.entries.lock().remove(id);
    }
}
