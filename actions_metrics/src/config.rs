//! Tuning knobs for the dispatch loop and the log fetcher.

use std::time::Duration;

/// How often running jobs get an in-progress accrual.
pub const DEFAULT_ACCRUAL_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound on one log lookup plus download.
pub const DEFAULT_LOG_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest accrual period the loop will schedule.
pub const MAX_ACCRUAL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub accrual_interval: Duration,
    pub log_fetch_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            accrual_interval: DEFAULT_ACCRUAL_INTERVAL,
            log_fetch_timeout: DEFAULT_LOG_FETCH_TIMEOUT,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero is ignored and anything above [`MAX_ACCRUAL_INTERVAL`] is capped.
    pub fn with_accrual_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.accrual_interval = interval.min(MAX_ACCRUAL_INTERVAL);
        }
        self
    }

    /// Zero is ignored.
    pub fn with_log_fetch_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.log_fetch_timeout = timeout;
        }
        self
    }

    /// The period the loop actually uses, whatever was written to the field.
    pub(crate) fn accrual_period(&self) -> Duration {
        if self.accrual_interval.is_zero() {
            DEFAULT_ACCRUAL_INTERVAL
        } else {
            self.accrual_interval.min(MAX_ACCRUAL_INTERVAL)
        }
    }
}
