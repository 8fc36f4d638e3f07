//! Circuit breaker for guarding calls to storage backends and external
//! providers (Kanban boards, LLM refiners).
//!
//! ## States
//!
//! - **Closed**: normal operation, all requests pass through
//! - **Open**: too many failures, requests fail immediately
//! - **Half-Open**: a single probe is allowed through to test recovery
//!
//! Breakers are named so a coordinator can run several side by side (one per
//! backend/provider) and report state by name.
//!
//! ```no_run
//! use coordinator_core::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() -> coordinator_core::Result<()> {
//! let breaker = CircuitBreaker::new("kanban", CircuitBreakerConfig::default());
//! let result = breaker.call(|| async {
//!     Ok::<_, coordinator_core::Error>(())
//! }).await;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
    pub half_open_test_period: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            half_open_test_period: Duration::from_secs(10),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub consecutive_failures: u32,
    pub circuit_opened_count: u32,
}

struct CircuitBreakerState {
    state: CircuitState,
    stats: CircuitBreakerStats,
    last_failure_time: Option<Instant>,
    half_open_started: Option<Instant>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            stats: CircuitBreakerStats::default(),
            last_failure_time: None,
            half_open_started: None,
        }
    }
}

/// A single named breaker: `{state, failure_count, last_failure_time}` plus
/// call stats, guarded behind an async `RwLock` so many tasks can share one
/// instance via `Arc`.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<RwLock<CircuitBreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            breaker = %name,
            threshold = config.failure_threshold,
            timeout = ?config.timeout,
            "initializing circuit breaker"
        );

        Self {
            name,
            config,
            state: Arc::new(RwLock::new(CircuitBreakerState::default())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let should_proceed = self.should_allow_request().await;

        if !should_proceed {
            let mut state = self.state.write().await;
            state.stats.rejected_calls += 1;
            debug!(breaker = %self.name, "rejecting request, circuit is open");
            return Err(Error::BreakerOpen {
                name: self.name.clone(),
            });
        }

        {
            let mut state = self.state.write().await;
            state.stats.total_calls += 1;
        }

        let result = operation().await;
        self.on_result(&result).await;
        result
    }

    async fn should_allow_request(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(last_failure) = state.last_failure_time {
                    if now.duration_since(last_failure) >= self.config.timeout {
                        info!(breaker = %self.name, "transitioning to half-open");
                        state.state = CircuitState::HalfOpen;
                        state.half_open_started = Some(now);
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    async fn on_result<T>(&self, result: &Result<T>) {
        let mut state = self.state.write().await;

        match result {
            Ok(_) => {
                state.stats.successful_calls += 1;
                self.on_success(&mut state);
            }
            Err(e) => {
                if e.is_recoverable() {
                    state.stats.failed_calls += 1;
                    self.on_failure(&mut state);
                } else {
                    debug!(breaker = %self.name, error = %e, "non-recoverable error, not affecting circuit");
                }
            }
        }
    }

    fn on_success(&self, state: &mut CircuitBreakerState) {
        match state.state {
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, "closing after successful recovery test");
                state.state = CircuitState::Closed;
                state.stats.consecutive_failures = 0;
                state.last_failure_time = None;
                state.half_open_started = None;
            }
            CircuitState::Closed => {
                if state.stats.consecutive_failures > 0 {
                    state.stats.consecutive_failures = 0;
                }
            }
            CircuitState::Open => {
                warn!(breaker = %self.name, "unexpected success while open");
            }
        }
    }

    fn on_failure(&self, state: &mut CircuitBreakerState) {
        state.stats.consecutive_failures += 1;
        state.last_failure_time = Some(Instant::now());

        debug!(
            breaker = %self.name,
            consecutive = state.stats.consecutive_failures,
            threshold = self.config.failure_threshold,
            "recorded failure"
        );

        match state.state {
            CircuitState::Closed => {
                if state.stats.consecutive_failures >= self.config.failure_threshold {
                    warn!(breaker = %self.name, "opening after consecutive failures");
                    state.state = CircuitState::Open;
                    state.stats.circuit_opened_count += 1;
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "reopening after failure in half-open state");
                state.state = CircuitState::Open;
                state.stats.circuit_opened_count += 1;
                state.half_open_started = None;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        self.state.read().await.stats.clone()
    }

    /// Pure exponential doubling, no jitter — jitter belongs to the retry
    /// wrapper, not the breaker.
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = self.config.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let delay = Duration::from_millis(delay);
        std::cmp::min(delay, self.config.max_delay)
    }

    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        info!(breaker = %self.name, "reset to closed state");
        state.state = CircuitState::Closed;
        state.stats.consecutive_failures = 0;
        state.last_failure_time = None;
        state.half_open_started = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_breaker(failure_threshold: u32, timeout_secs: u64) -> CircuitBreaker {
        let config = CircuitBreakerConfig {
            failure_threshold,
            timeout: Duration::from_secs(timeout_secs),
            half_open_test_period: Duration::from_secs(1),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
        };
        CircuitBreaker::new("test", config)
    }

    fn storage_err() -> Error {
        Error::StorageFailure("boom".to_string())
    }

    #[tokio::test]
    async fn starts_closed() {
        let cb = test_breaker(5, 30);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn successful_operation_is_recorded() {
        let cb = test_breaker(5, 30);
        let result = cb.call(|| async { Ok::<i32, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state().await, CircuitState::Closed);

        let stats = cb.stats().await;
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.successful_calls, 1);
    }

    #[tokio::test]
    async fn failed_operation_is_recorded() {
        let cb = test_breaker(5, 30);
        let result = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
        assert!(result.is_err());
        assert_eq!(cb.state().await, CircuitState::Closed);

        let stats = cb.stats().await;
        assert_eq!(stats.failed_calls, 1);
        assert_eq!(stats.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn opens_after_threshold() {
        let cb = test_breaker(5, 30);
        for i in 0..5 {
            let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
            if i < 4 {
                assert_eq!(cb.state().await, CircuitState::Closed);
            }
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let stats = cb.stats().await;
        assert_eq!(stats.circuit_opened_count, 1);
        assert_eq!(stats.consecutive_failures, 5);
    }

    #[tokio::test]
    async fn rejects_when_open() {
        let cb = test_breaker(3, 30);
        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let result = cb.call(|| async { Ok::<i32, Error>(42) }).await;
        assert!(matches!(result, Err(Error::BreakerOpen { .. })));

        let stats = cb.stats().await;
        assert_eq!(stats.rejected_calls, 1);
    }

    #[tokio::test]
    async fn transitions_to_half_open_then_closes_on_success() {
        let cb = test_breaker(3, 1);
        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let _ = cb.call(|| async { Ok::<i32, Error>(42) }).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = test_breaker(2, 1);
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;

        assert_eq!(cb.state().await, CircuitState::Open);
        let stats = cb.stats().await;
        assert_eq!(stats.circuit_opened_count, 2);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let cb = test_breaker(5, 30);
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
        }
        let _ = cb.call(|| async { Ok::<i32, Error>(42) }).await;

        let stats = cb.stats().await;
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let cb = test_breaker(5, 30);
        assert_eq!(cb.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(cb.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(cb.calculate_backoff(2), Duration::from_millis(400));
        assert_eq!(cb.calculate_backoff(3), Duration::from_millis(800));
        assert_eq!(cb.calculate_backoff(4), Duration::from_millis(1600));
        assert_eq!(cb.calculate_backoff(5), Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn non_recoverable_errors_dont_affect_circuit() {
        let cb = test_breaker(3, 30);
        for _ in 0..5 {
            let _ = cb
                .call(|| async { Err::<i32, Error>(Error::ValidationFailure("bad input".to_string())) })
                .await;
        }
        let stats = cb.stats().await;
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn reset_clears_state() {
        let cb = test_breaker(2, 30);
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<i32, Error>(storage_err()) }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        cb.reset().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn concurrent_operations_tally_correctly() {
        let cb = Arc::new(test_breaker(10, 30));
        let mut handles = vec![];

        for i in 0..20 {
            let cb = Arc::clone(&cb);
            handles.push(tokio::spawn(async move {
                let outcome = if i % 2 == 0 {
                    Ok::<i32, Error>(i)
                } else {
                    Err(Error::StorageFailure("boom".to_string()))
                };
                cb.call(|| async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    outcome
                })
                .await
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let stats = cb.stats().await;
        assert_eq!(stats.total_calls, 20);
        assert_eq!(stats.successful_calls, 10);
        assert_eq!(stats.failed_calls, 10);
    }
}
