//! Exponential back-off with symmetric jitter.
//!
//! Everything here is a pure function of the attempt number (and, for
//! [`RetryPolicy::delay_with_sample`], an explicit random sample) so the
//! schedule can be checked without a network or a clock.

use std::time::Duration;

use herald_core::config::RetryConfig;

/// Retry schedule for gateway calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the un-jittered delay.
    pub max_delay: Duration,
    /// Jitter factor in `[0, 1]`.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Builds a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay before retry number `attempt` (1-based).
    ///
    /// `min(base * 2^(attempt - 1), max)`; attempt 0 has no delay.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let shift = (attempt - 1).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Jittered delay for a given uniform sample `u` in `[0, 1)`.
    ///
    /// `base_delay(attempt) * (1 + jitter * (2u - 1))`.
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let u = if sample.is_finite() {
            sample.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let factor = 1.0 + self.jitter_factor() * (2.0 * u - 1.0);
        self.base_delay(attempt).mul_f64(factor)
    }

    /// Jittered delay before retry number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::random::<f64>())
    }

    /// Smallest and largest delay [`delay`](Self::delay) can return.
    pub fn bounds(&self, attempt: u32) -> (Duration, Duration) {
        let base = self.base_delay(attempt);
        let jitter = self.jitter_factor();
        (base.mul_f64(1.0 - jitter), base.mul_f64(1.0 + jitter))
    }

    fn jitter_factor(&self) -> f64 {
        if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
