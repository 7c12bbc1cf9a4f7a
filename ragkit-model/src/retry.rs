//! Exponential backoff with jitter for transient backend failures.
//!
//! Embedding and generation backends both rate-limit aggressively. Every
//! backend call in ragkit goes through [`with_retry`], which retries errors
//! that report themselves as transient via [`RetryableError`] and gives up
//! after [`RetryPolicy::max_attempts`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{ModelError, Result};

/// An error type that can tell the retry loop whether another attempt is worthwhile.
pub trait RetryableError: std::error::Error + Sized {
    /// Whether the failure is transient (rate limit, timeout, 5xx).
    fn is_transient(&self) -> bool;

    /// Server-suggested minimum delay before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Wrap the final error once all attempts are used up.
    fn exhausted(operation: &str, attempts: u32, last: Self) -> Self;
}

/// Backoff parameters for retrying transient failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first call.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Set the total number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the initial and maximum backoff in milliseconds.
    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if `max_attempts` is zero, the
    /// multiplier is below 1, or the initial backoff exceeds the maximum.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ModelError::Config("max_attempts must be at least 1".to_string()));
        }
        if !(self.multiplier >= 1.0) {
            return Err(ModelError::Config(format!(
                "multiplier ({}) must be at least 1.0",
                self.multiplier
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ModelError::Config(format!(
                "initial_backoff_ms ({}) must not exceed max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (0 = first retry), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.min(31) as i32);
        let ms = (self.initial_backoff_ms as f64 * exp).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }

    fn delay_for<E: RetryableError>(&self, attempt: u32, err: &E) -> Duration {
        let mut delay = self.base_delay(attempt);
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.0..=0.25);
            delay += delay.mul_f64(factor);
        }
        match err.retry_after() {
            Some(server) => delay.max(server),
            None => delay,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or exhausts the policy.
///
/// Permanent errors are returned unchanged on the first occurrence. When the
/// last allowed attempt fails transiently the error is wrapped with
/// [`RetryableError::exhausted`].
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> std::result::Result<T, E>
where
    E: RetryableError,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    error!(operation, attempts = attempt, error = %err, "retries exhausted");
                    return Err(E::exhausted(operation, attempt, err));
                }
                let delay = policy.delay_for(attempt - 1, &err);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(attempts).with_backoff(1, 2).with_jitter(false)
    }

    fn rate_limited() -> ModelError {
        ModelError::RateLimited { provider: "test".into(), retry_after_ms: None }
    }

    #[test]
    fn base_delay_grows_and_caps() {
        let policy = RetryPolicy::default().with_backoff(100, 1_000);
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(800));
        assert_eq!(policy.base_delay(10), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::default().with_backoff(400, 400);
        for _ in 0..50 {
            let d = policy.delay_for(0, &rate_limited());
            assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(500));
        }
    }

    #[test]
    fn retry_after_is_a_floor() {
        let policy = fast_policy(3);
        let err = ModelError::RateLimited { provider: "x".into(), retry_after_ms: Some(50) };
        assert_eq!(policy.delay_for(0, &err), Duration::from_millis(50));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::default().with_backoff(10, 5).validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str> = with_retry(&fast_policy(5), "embed", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 { Err(rate_limited()) } else { Ok("ok") }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(5), "embed", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ModelError::Api { provider: "p".into(), status: 401, message: "bad key".into() })
        })
        .await;
        assert!(matches!(result, Err(ModelError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_wraps_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(3), "generate", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(rate_limited())
        })
        .await;
        match result {
            Err(ModelError::RetriesExhausted { operation, attempts, last }) => {
                assert_eq!(operation, "generate");
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ModelError::RateLimited { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
