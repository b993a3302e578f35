//! Retry policy for the fetcher
//!
//! Delays grow exponentially: before retry `k` (1-based) the fetcher waits
//! `backoff_factor * 2^(k-1)` seconds, capped at `max_backoff`.

use crate::config::FetcherConfig;
use std::time::Duration;

/// Retry and timeout settings applied to every fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts per URL, including the first one
    pub max_attempts: u32,

    /// Multiplier of the exponential delay, in seconds
    pub backoff_factor: f64,

    /// Upper bound of a single delay
    pub max_backoff: Duration,

    /// Timeout of one attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Builds the policy from the fetcher configuration
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff_factor: config.backoff_factor,
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            attempt_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Delay to wait before retry number `retry` (1-based)
    ///
    /// Retry 0 is the first attempt and has no delay.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map(|delay| delay.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }

    /// The full sequence of delays an always-failing URL goes through
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|retry| self.backoff_delay(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}
