//! Retry with exponential backoff and bounded jitter.
//!
//! Only failures classified transient are retried; configuration and
//! validation errors and cancellation always propagate on the first
//! attempt. Jitter is drawn fresh per sleep and bounded by the base delay,
//! which keeps concurrent callers from synchronizing their retries while the
//! deterministic component stays capped at the configured maximum.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::classify::TransientErrorClassifier;
use crate::error::{AdapterError, ConfigError};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Validated backoff parameters. `max_retries` counts retries after the
/// first attempt, so an operation runs at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// # Errors
    ///
    /// Returns `ConfigError::RetryPolicy` when `base_delay` is zero or
    /// exceeds `max_delay`. Invariants are enforced here so a bad policy
    /// fails at startup, not on the first transient error.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if base_delay.is_zero() {
            return Err(ConfigError::RetryPolicy {
                reason: "base delay must be positive".to_string(),
            });
        }
        if base_delay > max_delay {
            return Err(ConfigError::RetryPolicy {
                reason: format!(
                    "base delay {}ms exceeds max delay {}ms",
                    base_delay.as_millis(),
                    max_delay.as_millis()
                ),
            });
        }
        Ok(Self {
            max_retries,
            base_delay,
            max_delay,
        })
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Deterministic backoff component for the given 1-based attempt:
    /// doubles per attempt and saturates at `max_delay`. The executor adds
    /// uniform jitter in `[0, base_delay)` on top at sleep time.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let scaled = base_ms.saturating_mul(1_u64 << exponent);
        Duration::from_millis(scaled).min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let bound = u64::try_from(self.base_delay.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        Duration::from_millis(rand::rng().random_range(0..bound))
    }
}

// ---------------------------------------------------------------------------
// RetryExecutor
// ---------------------------------------------------------------------------

/// Drives a fallible async operation through the retry state machine.
pub struct RetryExecutor {
    policy: RetryPolicy,
    classifier: Arc<dyn TransientErrorClassifier>,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(policy: RetryPolicy, classifier: Arc<dyn TransientErrorClassifier>) -> Self {
        Self { policy, classifier }
    }

    /// Invoke `attempt_fn` until it succeeds, fails fatally, or the retry
    /// budget is spent. The cancellation token is observed before every
    /// attempt and during every backoff sleep; cancellation mid-sleep aborts
    /// without a further attempt.
    ///
    /// # Errors
    ///
    /// Propagates the attempt's error unchanged once retries are ruled out
    /// or exhausted, or `AdapterError::Canceled` on cancellation.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt_fn: F,
        cancel: &CancellationToken,
    ) -> Result<T, AdapterError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let max_attempts = self.policy.max_retries() + 1;
        let mut attempt = 1_u32;
        loop {
            if cancel.is_cancelled() {
                return Err(AdapterError::Canceled);
            }
            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= max_attempts || !self.is_retryable(&error) {
                        return Err(error);
                    }
                    let delay = self.policy.backoff(attempt) + self.policy.jitter();
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms,
                        error = ?error,
                        "transient failure, backing off before retry"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => return Err(AdapterError::Canceled),
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Only a wrapped backend failure whose cause the classifier accepts is
    /// retryable; configuration, validation, and cancellation never are.
    fn is_retryable(&self, error: &AdapterError) -> bool {
        match error {
            AdapterError::DataAccess { cause, .. } => self.classifier.is_transient(cause),
            AdapterError::Config(_) | AdapterError::Validation { .. } | AdapterError::Canceled => {
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::classify::SqlStateClassifier;
    use crate::error::BackendError;

    use super::*;

    fn transient() -> AdapterError {
        AdapterError::data_access("op", "db", BackendError::driver(40613, "db unavailable"))
    }

    fn fatal() -> AdapterError {
        AdapterError::data_access("op", "db", BackendError::driver(2627, "constraint"))
    }

    fn executor(max_retries: u32) -> RetryExecutor {
        let policy = RetryPolicy::new(
            max_retries,
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
        .unwrap();
        RetryExecutor::new(policy, Arc::new(SqlStateClassifier::default()))
    }

    #[test]
    fn policy_rejects_zero_base_delay() {
        let err = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ConfigError::RetryPolicy { .. }));
    }

    #[test]
    fn policy_rejects_base_above_max() {
        let err =
            RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ConfigError::RetryPolicy { .. }));
    }

    #[test]
    fn zero_retries_is_a_valid_policy() {
        let policy =
            RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1)).unwrap();
        assert_eq!(policy.max_retries(), 0);
    }

    #[test]
    fn backoff_doubles_then_saturates() {
        let policy = RetryPolicy::new(
            10,
            Duration::from_millis(100),
            Duration::from_millis(1500),
        )
        .unwrap();

        let delays: Vec<u64> = (1..=6)
            .map(|attempt| u64::try_from(policy.backoff(attempt).as_millis()).unwrap())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1500, 1500]);

        // Non-decreasing and capped, including far past the doubling range.
        for window in delays.windows(2) {
            assert!(window[0] <= window[1]);
        }
        assert_eq!(policy.backoff(64), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_body_runs_exactly_max_plus_one_times() {
        let executor = executor(3);
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = executor
            .execute(
                "op",
                |_attempt| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(transient()) }
                },
                &cancel,
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(matches!(result, Err(AdapterError::DataAccess { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let executor = executor(5);
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = executor
            .execute(
                "op",
                |_attempt| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(fatal()) }
                },
                &cancel,
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn validation_error_is_not_retried() {
        let executor = executor(5);
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = executor
            .execute(
                "op",
                |_attempt| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(AdapterError::validation("limit", "too large")) }
                },
                &cancel,
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AdapterError::Validation { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let executor = executor(5);
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = executor
            .execute(
                "op",
                |_attempt| {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(transient())
                        } else {
                            Ok(42)
                        }
                    }
                },
                &cancel,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_aborts_without_another_attempt() {
        // Long delays so the sleep is guaranteed to be in progress when the
        // cancel task fires under virtual time.
        let policy =
            RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(600)).unwrap();
        let executor = RetryExecutor::new(policy, Arc::new(SqlStateClassifier::default()));
        let attempts = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            })
        };

        let result: Result<(), _> = executor
            .execute(
                "op",
                |_attempt| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(transient()) }
                },
                &cancel,
            )
            .await;

        canceller.await.unwrap();
        assert!(matches!(result, Err(AdapterError::Canceled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_the_first_attempt() {
        let executor = executor(2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), _> = executor
            .execute("op", |_attempt| async { Ok(()) }, &cancel)
            .await;
        assert!(matches!(result, Err(AdapterError::Canceled)));
    }
}
