//! Retry utilities: bounded backoff policies for broker connections.
//!
//! One configurable strategy serves every process that needs a broker
//! connection. The policy plugs into `backon` as a `BackoffBuilder`, so callers
//! use the usual `.retry(policy)` combinator.

use std::time::Duration;

use backon::BackoffBuilder;
use serde::Deserialize;

/// Backoff policy for connection retries.
///
/// `max_attempts` is the number of retries after the first failure, so at
/// most `max_attempts + 1` dials are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Sleep the same interval between every attempt.
    Fixed { interval_secs: u64, max_attempts: u32 },
    /// Sleep `n²` seconds after the n-th consecutive failure.
    Quadratic { max_attempts: u32 },
}

impl BackoffPolicy {
    /// Gateway default: 2 seconds between attempts, 15 retries.
    pub fn fixed_default() -> Self {
        BackoffPolicy::Fixed {
            interval_secs: 2,
            max_attempts: 15,
        }
    }

    /// Listener default: quadratic growth, 10 retries.
    pub fn quadratic_default() -> Self {
        BackoffPolicy::Quadratic { max_attempts: 10 }
    }

    /// Maximum number of retries.
    pub fn max_attempts(&self) -> u32 {
        match self {
            BackoffPolicy::Fixed { max_attempts, .. } => *max_attempts,
            BackoffPolicy::Quadratic { max_attempts } => *max_attempts,
        }
    }

    /// Delay before the next dial, given the number of failures so far (1-based).
    pub fn delay_after_failures(&self, failures: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed { interval_secs, .. } => Duration::from_secs(*interval_secs),
            BackoffPolicy::Quadratic { .. } => {
                let n = u64::from(failures);
                Duration::from_secs(n.saturating_mul(n))
            }
        }
    }
}

impl BackoffBuilder for BackoffPolicy {
    type Backoff = PolicyBackoff;

    fn build(self) -> Self::Backoff {
        PolicyBackoff {
            policy: self,
            failures: 0,
        }
    }
}

/// Delay sequence produced by a [`BackoffPolicy`].
///
/// Yields one delay per failure until the cap, then `None`.
#[derive(Debug, Clone)]
pub struct PolicyBackoff {
    policy: BackoffPolicy,
    failures: u32,
}

impl Iterator for PolicyBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.failures >= self.policy.max_attempts() {
            return None;
        }
        self.failures += 1;
        Some(self.policy.delay_after_failures(self.failures))
    }
}

#[cfg(test)]
mod tests;
