//! Bounded retry for the workflow-engine boundary.
//!
//! Retries are the only concurrency-safety mechanism in this system and
//! they are deliberately weak: a small fixed attempt count with a fixed
//! backoff, applied at the service boundary. Configuration and content
//! errors are never routed through here.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::ServiceError;

/// Fixed-count, fixed-backoff retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: usize,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Exhaustion surfaces as [`ServiceError::RetriesExhausted`] carrying the
/// last error's message.
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut last_message = String::new();

    for attempt in 1..=policy.attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    operation,
                    attempt,
                    attempts = policy.attempts,
                    "Service call failed: {err}"
                );
                last_message = err.to_string();
            }
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(ServiceError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: policy.attempts,
        message: last_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let calls = AtomicUsize::new(0);
        let result = retry(quick_policy(), "noop", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ServiceError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result = retry(quick_policy(), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ServiceError::Workflow {
                        message: "throttled".to_string(),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_error() {
        let calls = AtomicUsize::new(0);
        let err = retry(quick_policy(), "doomed", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(ServiceError::Workflow {
                    message: "still down".to_string(),
                })
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            ServiceError::RetriesExhausted {
                operation,
                attempts,
                message,
            } => {
                assert_eq!(operation, "doomed");
                assert_eq!(attempts, 3);
                assert!(message.contains("still down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
