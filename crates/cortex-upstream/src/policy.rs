//! Retry policy

use std::time::Duration;

/// Retry-with-backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, at least one
    pub max_attempts: u32,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_factor: f64,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Timeout of the first attempt
    pub base_timeout: Duration,
    /// Timeout added per subsequent attempt
    pub timeout_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2.0,
            base_delay: Duration::from_secs(1),
            base_timeout: Duration::from_secs(10),
            timeout_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max attempts (clamped to at least one)
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// With backoff factor (clamped to at least 1.0)
    #[inline]
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// With base delay
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// With base timeout
    #[inline]
    #[must_use]
    pub fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    /// With timeout step
    #[inline]
    #[must_use]
    pub fn with_timeout_step(mut self, step: Duration) -> Self {
        self.timeout_step = step;
        self
    }

    /// Timeout for zero-based attempt `n`
    #[must_use]
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout
            .saturating_add(self.timeout_step.saturating_mul(attempt))
    }

    /// Sleep after zero-based failed attempt `n`
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Attempts actually made per call
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
