//! Retry policy with exponential backoff for exchange calls.
//!
//! One policy object for every exchange-mutating call, so adapters never
//! carry their own retry loops.
//!
//! # Retry classes
//!
//! | Retryable | Rate limited | Not retryable |
//! |-----------|--------------|---------------|
//! | Connection reset, DNS, 5xx | HTTP 429 (honours `retry_after`) | Insufficient balance |
//! | Call timeout | | Invalid size / price |
//! | Auth hiccup (expired nonce, clock skew) | | Exchange business rejection |
//!
//! # Example
//!
//! ```rust,ignore
//! use trade_guard::resilience::{ExponentialBackoff, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let mut backoff = ExponentialBackoff::new(&policy);
//!
//! let delay1 = backoff.next_backoff(); // ~250ms with jitter
//! let delay2 = backoff.next_backoff(); // ~500ms with jitter
//! let delay3 = backoff.next_backoff(); // None: 3 attempts used
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How an error should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient; retry after backoff.
    Retryable,
    /// Transient; retry after the server-provided delay when present.
    RateLimited {
        /// Delay requested by the exchange.
        retry_after: Option<Duration>,
    },
    /// Permanent for this request; fail immediately.
    NonRetryable,
}

/// Errors that know their retry class.
pub trait Retryable {
    /// Classify this error.
    fn retry_class(&self) -> RetryClass;

    /// Whether the retry loop should try again.
    fn is_retryable(&self) -> bool {
        !matches!(self.retry_class(), RetryClass::NonRetryable)
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3).
    pub max_attempts: u32,
    /// Delay before the second attempt (default: 250ms).
    pub initial_backoff: Duration,
    /// Upper bound on any delay (default: 5s).
    pub max_backoff: Duration,
    /// Growth factor between delays (default: 2.0).
    pub backoff_multiplier: f64,
    /// Randomization, ±fraction of the delay (default: 0.2).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the next attempt for an error of class `class`.
    ///
    /// Returns `None` when the error is not retryable or attempts are used up.
    pub fn delay_for(&self, class: RetryClass, backoff: &mut ExponentialBackoff) -> Option<Duration> {
        match class {
            RetryClass::NonRetryable => None,
            RetryClass::Retryable => backoff.next_backoff(),
            RetryClass::RateLimited { retry_after } => {
                let computed = backoff.next_backoff()?;
                Some(retry_after.unwrap_or(computed))
            }
        }
    }
}

/// Calculator for exponential backoff with jitter.
#[derive(Debug)]
pub struct ExponentialBackoff {
    retries_used: u32,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Create a calculator for one request.
    #[must_use]
    pub const fn new(policy: &RetryPolicy) -> Self {
        Self {
            retries_used: 0,
            max_retries: policy.max_attempts.saturating_sub(1),
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            jitter_factor: policy.jitter_factor,
        }
    }

    /// Next delay, or `None` once every retry is used.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries_used >= self.max_retries {
            return None;
        }
        let base = self.base_backoff_ms();
        let jittered = self.apply_jitter(base).min(self.max_backoff_ms);
        self.retries_used += 1;
        Some(Duration::from_millis(jittered))
    }

    /// Retries handed out so far.
    #[must_use]
    pub const fn retries_used(&self) -> u32 {
        self.retries_used
    }

    fn base_backoff_ms(&self) -> u64 {
        let multiplier = self.backoff_multiplier.powi(self.retries_used as i32);
        let backoff = (self.initial_backoff_ms as f64 * multiplier) as u64;
        backoff.min(self.max_backoff_ms)
    }

    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 || backoff_ms == 0 {
            return backoff_ms;
        }
        let range = backoff_ms as f64 * self.jitter_factor;
        let min = (backoff_ms as f64 - range).max(0.0);
        let max = backoff_ms as f64 + range;
        rand::rng().random_range(min..=max) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn three_attempts_mean_two_backoffs() {
        let mut backoff = ExponentialBackoff::new(&no_jitter());
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.retries_used(), 2);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3),
            backoff_multiplier: 10.0,
            jitter_factor: 0.0,
        };
        let mut backoff = ExponentialBackoff::new(&policy);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn jitter_stays_in_band() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = ExponentialBackoff::new(&policy).next_backoff().unwrap();
            assert!(delay >= Duration::from_millis(200) && delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn non_retryable_never_waits() {
        let policy = no_jitter();
        let mut backoff = ExponentialBackoff::new(&policy);
        assert_eq!(policy.delay_for(RetryClass::NonRetryable, &mut backoff), None);
        assert_eq!(backoff.retries_used(), 0);
    }

    #[test]
    fn rate_limit_prefers_server_delay() {
        let policy = no_jitter();
        let mut backoff = ExponentialBackoff::new(&policy);
        let delay = policy.delay_for(
            RetryClass::RateLimited {
                retry_after: Some(Duration::from_secs(2)),
            },
            &mut backoff,
        );
        assert_eq!(delay, Some(Duration::from_secs(2)));
        assert_eq!(backoff.retries_used(), 1);
    }

    #[test]
    fn no_retry_policy_gives_up_immediately() {
        let mut backoff = ExponentialBackoff::new(&RetryPolicy::no_retry());
        assert_eq!(backoff.next_backoff(), None);
    }
}
