//! Bounded retry policy for model calls.
//!
//! Attempts are numbered from 1. After failed attempt `n` the caller waits
//! `base_delay × n` before attempt `n + 1`, up to `max_retries` extra
//! attempts. Every [`ModelError`] is retried unless
//! `retry_configuration_errors` is turned off, in which case errors that
//! retrying cannot fix (missing or rejected credentials) end the loop
//! early.

use std::time::Duration;

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retry_configuration_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            retry_configuration_errors: true,
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts, first one included.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt should follow failed attempt `attempt`.
    pub fn should_retry(&self, attempt: u32, err: &ModelError) -> bool {
        if attempt >= self.total_attempts() {
            return false;
        }
        self.retry_configuration_errors || !err.is_configuration()
    }
}
