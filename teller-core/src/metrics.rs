//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the bank:
//!
//! - `bank_deposits_total` / `bank_withdrawals_total` / `bank_transfers_total`
//! - `bank_registrations_total` / `bank_closures_total`
//! - `bank_auth_failures_total`
//! - `bank_persist_failures_total`
//! - `bank_persist_duration_seconds` - Histogram of flush latencies
//! - `bank_accounts` - Current number of accounts

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Completed deposits
    pub deposits_total: IntCounter,

    /// Completed withdrawals
    pub withdrawals_total: IntCounter,

    /// Completed transfers
    pub transfers_total: IntCounter,

    /// Accounts registered
    pub registrations_total: IntCounter,

    /// Accounts closed
    pub closures_total: IntCounter,

    /// Failed authentications
    pub auth_failures_total: IntCounter,

    /// Failed durable flushes
    pub persist_failures_total: IntCounter,

    /// Flush latency histogram
    pub persist_duration: Histogram,

    /// Current account count
    pub accounts: IntGauge,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deposits_total = IntCounter::new("bank_deposits_total", "Completed deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("bank_withdrawals_total", "Completed withdrawals")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let transfers_total = IntCounter::new("bank_transfers_total", "Completed transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let registrations_total =
            IntCounter::new("bank_registrations_total", "Accounts registered")?;
        registry.register(Box::new(registrations_total.clone()))?;

        let closures_total = IntCounter::new("bank_closures_total", "Accounts closed")?;
        registry.register(Box::new(closures_total.clone()))?;

        let auth_failures_total =
            IntCounter::new("bank_auth_failures_total", "Failed authentications")?;
        registry.register(Box::new(auth_failures_total.clone()))?;

        let persist_failures_total =
            IntCounter::new("bank_persist_failures_total", "Failed durable flushes")?;
        registry.register(Box::new(persist_failures_total.clone()))?;

        let persist_duration = Histogram::with_opts(
            HistogramOpts::new("bank_persist_duration_seconds", "Flush latency").buckets(vec![
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0,
            ]),
        )?;
        registry.register(Box::new(persist_duration.clone()))?;

        let accounts = IntGauge::new("bank_accounts", "Current account count")?;
        registry.register(Box::new(accounts.clone()))?;

        Ok(Self {
            deposits_total,
            withdrawals_total,
            transfers_total,
            registrations_total,
            closures_total,
            auth_failures_total,
            persist_failures_total,
            persist_duration,
            accounts,
            registry,
        })
    }

    /// Record flush latency
    pub fn record_persist_duration(&self, duration_seconds: f64) {
        self.persist_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
