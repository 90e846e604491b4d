use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::ports::music_service::ServiceError;

/// Retry knobs for remote calls. `max_attempts` includes the initial call;
/// the first retry sleeps `base_backoff` and each further retry doubles it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_backoff)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Run `op` with bounded exponential backoff, retrying transient failures
/// only. On exhaustion or a permanent failure the final error is returned
/// unchanged.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    op.retry(policy.backoff())
        .when(ServiceError::is_transient)
        .notify(|err, delay| {
            log::warn!("{operation} failed ({err}); retrying in {delay:?}");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn unavailable() -> ServiceError {
        ServiceError::Status {
            operation: "search",
            status: 503,
            message: "service unavailable".into(),
        }
    }

    fn not_found() -> ServiceError {
        ServiceError::Status {
            operation: "search",
            status: 404,
            message: "not found".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures_with_increasing_delays() {
        let started = tokio::time::Instant::now();
        let attempts = Cell::new(0u32);

        let result = with_retry(&RetryPolicy::default(), "search", || {
            let attempt = attempts.get() + 1;
            attempts.set(attempt);
            async move {
                if attempt < 3 {
                    Err(unavailable())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.get(), 3);
        // Two sleeps: 2s then 4s.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_secs(7), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_final_error() {
        let attempts = Cell::new(0u32);

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "search", || {
            attempts.set(attempts.get() + 1);
            async { Err(unavailable()) }
        })
        .await;

        assert_eq!(attempts.get(), 3);
        match result {
            Err(ServiceError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let attempts = Cell::new(0u32);

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "search", || {
            attempts.set(attempts.get() + 1);
            async { Err(not_found()) }
        })
        .await;

        assert_eq!(attempts.get(), 1);
        assert!(matches!(
            result,
            Err(ServiceError::Status { status: 404, .. })
        ));
    }
}
