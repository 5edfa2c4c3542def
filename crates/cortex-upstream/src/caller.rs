//! Retrying call wrapper with statistics and health tracking

use crate::error::{BoxError, UpstreamError};
use crate::policy::RetryPolicy;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default window in which a success keeps the upstream healthy
pub const DEFAULT_HEALTH_WINDOW: Duration = Duration::from_secs(300);

/// Call statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CallStats {
    /// Attempts made across all calls
    pub total_attempts: u64,
    /// Calls that eventually succeeded
    pub successful_calls: u64,
    /// Calls that exhausted every attempt
    pub failed_calls: u64,
    /// Successful calls per attempt, in percent
    pub success_rate: f64,
}

/// Health snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// Success seen within the health window
    pub healthy: bool,
    /// Wall-clock time of the last success
    pub last_success: Option<DateTime<Utc>>,
    /// Failed calls since the last success
    pub consecutive_failures: u32,
    /// Call statistics
    pub stats: CallStats,
}

#[derive(Debug, Default)]
struct Counters {
    total_attempts: u64,
    successful_calls: u64,
    failed_calls: u64,
    consecutive_failures: u32,
    last_success: Option<(Instant, DateTime<Utc>)>,
}

/// Retry-with-backoff wrapper shared by the modes that reach one upstream
#[derive(Debug)]
pub struct UpstreamCaller {
    name: String,
    policy: RetryPolicy,
    health_window: Duration,
    counters: Mutex<Counters>,
}

impl UpstreamCaller {
    /// Create caller with policy
    #[must_use]
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            health_window: DEFAULT_HEALTH_WINDOW,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// With health window
    #[inline]
    #[must_use]
    pub fn with_health_window(mut self, window: Duration) -> Self {
        self.health_window = window;
        self
    }

    /// Upstream name used in logs
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` with per-attempt timeouts and backoff between attempts
    ///
    /// # Errors
    /// - `UpstreamError::Exhausted` wrapping the final attempt's error
    pub async fn call<T, E, F, Fut>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            self.counters.lock().total_attempts += 1;
            let timeout = self.policy.timeout_for(attempt);
            tracing::debug!(upstream = %self.name, attempt = attempt + 1, attempts, "upstream attempt");

            let error = match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(value)) => {
                    self.record_success();
                    if attempt > 0 {
                        tracing::info!(upstream = %self.name, attempt = attempt + 1, "upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => UpstreamError::Failed(e.into()),
                Err(_) => UpstreamError::TimedOut(timeout),
            };
            tracing::warn!(upstream = %self.name, attempt = attempt + 1, error = %error, "upstream attempt failed");

            attempt += 1;
            if attempt >= attempts {
                let consecutive = self.record_failure();
                tracing::error!(
                    upstream = %self.name,
                    attempts,
                    consecutive_failures = consecutive,
                    "all upstream attempts failed"
                );
                return Err(UpstreamError::Exhausted {
                    attempts,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_after(attempt - 1);
            tracing::debug!(upstream = %self.name, delay_ms = delay.as_millis(), "retrying after backoff");
            tokio::time::sleep(delay).await;
        }
    }

    fn record_success(&self) {
        let mut counters = self.counters.lock();
        counters.successful_calls += 1;
        counters.consecutive_failures = 0;
        counters.last_success = Some((Instant::now(), Utc::now()));
    }

    fn record_failure(&self) -> u32 {
        let mut counters = self.counters.lock();
        counters.failed_calls += 1;
        counters.consecutive_failures = counters.consecutive_failures.saturating_add(1);
        counters.consecutive_failures
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CallStats {
        let counters = self.counters.lock();
        stats_of(&counters)
    }

    /// Check if a call succeeded within the health window
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.health().healthy
    }

    /// Current health
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        let counters = self.counters.lock();
        let healthy = counters
            .last_success
            .is_some_and(|(at, _)| at.elapsed() < self.health_window);
        HealthStatus {
            healthy,
            last_success: counters.last_success.map(|(_, wall)| wall),
            consecutive_failures: counters.consecutive_failures,
            stats: stats_of(&counters),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn stats_of(counters: &Counters) -> CallStats {
    let success_rate = if counters.total_attempts == 0 {
        0.0
    } else {
        counters.successful_calls as f64 / counters.total_attempts as f64 * 100.0
    };
    CallStats {
        total_attempts: counters.total_attempts,
        successful_calls: counters.successful_calls,
        failed_calls: counters.failed_calls,
        success_rate,
    }
}
