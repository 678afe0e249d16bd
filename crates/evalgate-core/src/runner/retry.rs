use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::RunPolicy;
use crate::evaluator::EvaluatorError;
use crate::model_client::InvokeError;

pub(crate) trait Retryable {
    fn is_retryable(&self) -> bool;
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for InvokeError {
    fn is_retryable(&self) -> bool {
        InvokeError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        Self::timeout(after)
    }
}

impl Retryable for EvaluatorError {
    fn is_retryable(&self) -> bool {
        EvaluatorError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        Self::Transport(InvokeError::timeout(after))
    }
}

#[derive(Debug)]
pub(crate) struct Attempted<T, E> {
    pub(crate) result: Result<T, E>,
    pub(crate) attempts: u32,
}

/// Runs `call` under the per-call timeout, retrying retryable failures with
/// exponential backoff until `max_attempts` is spent.
pub(crate) async fn with_retry<T, E, F, Fut>(policy: &RunPolicy, label: &str, mut call: F) -> Attempted<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let error = match tokio::time::timeout(policy.call_timeout, call()).await {
            Ok(Ok(value)) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Ok(Err(err)) => err,
            Err(_) => E::timed_out(policy.call_timeout),
        };

        if !error.is_retryable() || attempt >= max_attempts {
            warn!(label, attempts = attempt, error = %error, "giving up");
            return Attempted {
                result: Err(error),
                attempts: attempt,
            };
        }
        let backoff = policy.backoff_for(attempt);
        debug!(label, attempt, backoff_ms = backoff.as_millis(), error = %error, "retrying");
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RunPolicy {
        RunPolicy {
            backoff_base: Duration::from_millis(1),
            call_timeout: Duration::from_millis(50),
            ..RunPolicy::default()
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let outcome = with_retry(&fast_policy(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(InvokeError::transient("503"))
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(outcome.result.ok(), Some("done"));
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn fatal_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome = with_retry(&fast_policy(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(InvokeError::fatal("400"))
        })
        .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_exhaust_attempts() {
        let outcome = with_retry(&fast_policy(), "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), InvokeError>(())
        })
        .await;
        let err = outcome.result.expect_err("timeout");
        assert_eq!(err.kind, crate::model_client::InvokeErrorKind::Timeout);
        assert_eq!(outcome.attempts, 3);
    }
}
