//! Retry with jittered exponential backoff.
//!
//! Jitter is drawn from the OS CSPRNG (`rand::rngs::OsRng`), not a
//! general-purpose PRNG: the multiplier is a security contract, not a
//! cosmetic smoothing of thundering-herd retries.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use rand::rngs::OsRng;
use rand::TryRngCore;

/// Classifies an error as worth retrying.
pub trait Retryable {
    fn is_recoverable(&self) -> bool;
}

impl Retryable for crate::error::Error {
    fn is_recoverable(&self) -> bool {
        crate::error::Error::is_recoverable(self)
    }
}

#[derive(Debug, Default)]
pub struct RetryMetrics {
    total: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
}

impl RetryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_retry(&self, succeeded: bool) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if succeeded {
            self.success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failure.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failure.load(Ordering::SeqCst)
    }
}

/// Retry behavior configuration.
///
/// `max_attempts` mirrors the attempt count of the source system (an attempt
/// budget, not a retry-only count): with `max_attempts = 3` the operation
/// runs at most 3 times total.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }
}

/// Draws a jitter multiplier in `[0.5, 1.5)` from the OS CSPRNG.
fn secure_jitter_multiplier() -> f64 {
    let mut rng = OsRng;
    let sample: f64 = match rng.try_next_u64() {
        Ok(bits) => (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64),
        Err(_) => 0.5, // degrade to midpoint of the jitter range, never to zero retries
    };
    0.5 + sample
}

pub struct RetryPolicy {
    config: RetryConfig,
    metrics: Option<RetryMetrics>,
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_config(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: RetryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exp_delay_secs =
            self.config.base_delay.as_secs_f64() * self.config.exponential_base.powi(attempt as i32);
        let capped_secs = exp_delay_secs.min(self.config.max_delay.as_secs_f64());

        let delay_secs = if self.config.jitter {
            capped_secs * secure_jitter_multiplier()
        } else {
            capped_secs
        };

        Duration::from_secs_f64(delay_secs.max(0.0))
    }

    fn record(&self, succeeded: bool, attempt: u32) {
        if attempt > 0 {
            if let Some(ref metrics) = self.metrics {
                metrics.record_retry(succeeded);
            }
        }
    }

    /// Runs `operation` up to `max_attempts` times, sleeping with jittered
    /// backoff between attempts. Only the last attempt's error is returned.
    pub async fn execute<F, T, E, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Debug,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    self.record(true, attempt);
                    return Ok(value);
                }
                Err(err) => {
                    let is_last = attempt + 1 >= self.config.max_attempts;
                    if !err.is_recoverable() || is_last {
                        self.record(false, attempt);
                        return Err(err);
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(attempt, ?delay, ?err, "retrying after recoverable error");
                    self.record(false, attempt);
                    attempt += 1;
                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug)]
    struct Boom;

    impl Retryable for Boom {
        fn is_recoverable(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::with_config(
            RetryConfig::default()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(5)),
        );

        let result: Result<(), Boom> = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Boom)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy::new();
        let result: Result<i32, Boom> = policy.execute(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn jitter_multiplier_is_in_expected_range() {
        for _ in 0..1000 {
            let m = secure_jitter_multiplier();
            assert!((0.5..1.5).contains(&m), "{m} out of range");
        }
    }
}
