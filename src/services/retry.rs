//! Retry policy with exponential backoff for scoring calls and sink writes.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::EvaluationResult;
use crate::domain::models::RetryConfig;

/// Bounded retry with exponential backoff.
///
/// Backoff doubles with each retry and is capped at `max_backoff_ms`:
/// 500ms → 1s → 2s → ... with the default configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }
}

impl RetryPolicy {
    /// Policy with exponential backoff between `initial_backoff_ms` and `max_backoff_ms`.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// Policy that retries immediately, for tests and local runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, 0, 0)
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Execute an operation, retrying retryable failures with backoff.
    ///
    /// `label` identifies the operation in logs.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> EvaluationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EvaluationResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(operation = label, retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if err.is_retryable() && attempt < self.max_retries {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            operation = label,
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts(),
                            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "attempt failed, retrying"
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if err.is_retryable() {
                            warn!(operation = label, attempts = attempt + 1, error = %err, "giving up after retries");
                        } else {
                            debug!(operation = label, error = %err, "permanent error, not retrying");
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Exponential backoff for the given zero-based retry attempt.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::EvaluationError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 500, 3_000);
        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(500));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(2_000));
        assert_eq!(policy.calculate_backoff(3), Duration::from_millis(3_000));
        assert_eq!(policy.calculate_backoff(40), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::immediate(2);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = policy
            .execute("score", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(EvaluationError::ScoringFailure("timeout".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let policy = RetryPolicy::immediate(2);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: EvaluationResult<()> = policy
            .execute("append", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EvaluationError::SinkWriteFailure("disk full".into()))
            })
            .await;

        assert!(matches!(result, Err(EvaluationError::SinkWriteFailure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_attempts());
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::immediate(3);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: EvaluationResult<()> = policy
            .execute("lookup", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EvaluationError::InvalidParameters("bad".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
