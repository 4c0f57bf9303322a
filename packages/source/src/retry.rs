//! Per-page retry policy and transport error classification.
//!
//! A page request may fail up to `max_attempts` times in a row; the
//! counter resets after every successful page. With the default backoff
//! the waits are 1s, 2s, 4s, ... capped at [`MAX_BACKOFF`].

use std::time::Duration;

use crate::TransportError;

/// Default number of retries allowed per page.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Default base delay before the first retry.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on a single wait between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How many consecutive failures a page may accumulate, and how long to
/// wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures tolerated per page before fetching stops.
    pub max_attempts: u32,
    /// Base delay, doubled for each consecutive failure. Zero disables
    /// waiting.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Whether `failures` consecutive failures exhaust the budget.
    #[must_use]
    pub const fn exhausted(&self, failures: u32) -> bool {
        failures > self.max_attempts
    }

    /// Delay before retrying after the `failures`-th consecutive failure
    /// (1-based).
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = failures.saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }
}

/// Maps a `reqwest` failure onto the transport taxonomy.
#[must_use]
pub fn classify(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::ConnectionFailure(e.to_string())
    } else {
        TransportError::Unclassified(e.to_string())
    }
}
