//! Failure classification and backoff schedule
//!
//! Every failed attempt is classified before anything else happens to it:
//!
//! | Failure | Decision |
//! |---------|----------|
//! | HTTP 401 / 403, login redirect | Fail (auth) |
//! | HTTP 429 | Retry |
//! | HTTP 5xx | Retry |
//! | Other HTTP 4xx | Fail |
//! | Timeout, connection, body errors | Retry |
//! | Redirect loops, unrecognized errors | Fail |

use crate::config::RetryConfig;
use crate::crawler::fetcher::FetchError;
use rand::Rng;
use std::time::Duration;

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back off and try again
    Retry,
    /// Surface the failure to the caller now
    Fail,
}

/// Classifies a failure into a retry decision
///
/// Unrecognized error shapes fail closed.
pub fn classify(error: &FetchError) -> RetryDecision {
    match error {
        FetchError::RateLimited { .. }
        | FetchError::Server { .. }
        | FetchError::Network { .. } => RetryDecision::Retry,
        FetchError::Auth { .. }
        | FetchError::Client { .. }
        | FetchError::Redirect { .. }
        | FetchError::Unclassified { .. }
        | FetchError::Exhausted { .. } => RetryDecision::Fail,
    }
}

/// Exponential backoff with a cap and uniform jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Backoff before retrying after failed attempt number `attempt` (1-based),
    /// without jitter: `base * 2^(attempt - 1)`, capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Backoff for `attempt` plus a random jitter in `[0, jitter]`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.backoff(attempt) + jitter
    }

    /// Returns true if another attempt may follow attempt number `attempt`
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
