//! Retry policy for partition output
//!
//! The pool never retries connection creation itself; retrying a failed
//! partition is the caller's decision, made here with exponential backoff
//! between attempts.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How often a failed partition is attempted, and how long to wait in between
///
/// The wait after the `n`th failed attempt is
/// `initial_backoff * multiplier^(n - 1)`, capped at `max_backoff`, with
/// optional ±25% jitter so partitions that failed together do not retry in
/// lockstep.
///
/// ```
/// use std::time::Duration;
/// use sinkpool_connection::output::RetryPolicy;
///
/// let retry = RetryPolicy::new(5).with_backoff_ms(50, 1_000);
///
/// assert_eq!(retry.delay_after(1), Duration::from_millis(50));
/// assert_eq!(retry.delay_after(3), Duration::from_millis(200));
/// assert_eq!(retry.delay_after(10), Duration::from_millis(1_000));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per partition, including the first (at least 1)
    max_attempts: u32,
    /// Wait after the first failure, in milliseconds
    initial_backoff_ms: u64,
    /// Upper bound on any single wait, in milliseconds
    max_backoff_ms: u64,
    /// Growth factor between consecutive waits
    multiplier: f64,
    /// Spread each wait by up to ±25%
    jitter: bool,
}

impl RetryPolicy {
    /// `max_attempts` attempts with the default backoff (100ms doubling to 30s)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::new(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the first wait and the cap. The first wait is at least 1ms and the
    /// cap never undercuts it.
    pub fn with_backoff_ms(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms.max(1);
        self.max_backoff_ms = max_ms.max(self.initial_backoff_ms);
        self
    }

    /// Values below 1.0 are treated as 1.0 (constant backoff).
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms).max(self.initial_backoff())
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier.max(1.0)
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter
    }

    /// Whether another attempt follows `failed_attempts` failures
    pub fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts()
    }

    /// How long to wait after `failed_attempts` consecutive failures
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max = self.max_backoff();
        let scaled = self.initial_backoff().as_millis() as f64 * self.multiplier().powi(exponent);
        let delay = if scaled >= max.as_millis() as f64 {
            max
        } else {
            Duration::from_millis(scaled as u64)
        };

        if !self.jitter {
            return delay;
        }
        let spread = delay / 4;
        delay - spread + rand::thread_rng().gen_range(Duration::ZERO..=spread * 2)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
