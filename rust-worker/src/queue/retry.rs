//! Retry bookkeeping for failed claims.

use std::time::Duration;

/// What to do with an event after a failed processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the event to the pending set, claimable after `delay`.
    Retry { delay: Duration },
    /// Attempts exhausted; park the event in the terminal failed state.
    GiveUp,
}

/// Retry ceiling and exponential backoff applied when a claim resolves with a failure.
///
/// A zero `backoff_base` makes failed events claimable again immediately, so
/// the worker's poll interval is the only throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            backoff_base: Duration::ZERO,
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Policy that never gives up and never delays.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    /// Decide the fate of an event that has now failed `attempts` times in total.
    pub fn after_failure(&self, attempts: i32) -> RetryDecision {
        let attempts = attempts.max(0) as u32;

        match self.max_attempts {
            Some(max) if attempts >= max => RetryDecision::GiveUp,
            _ => RetryDecision::Retry {
                delay: self.backoff(attempts),
            },
        }
    }

    /// `backoff_base * 2^(attempts - 1)`, capped at `backoff_max`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempts.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1u32 << exponent)
            .map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }
}
