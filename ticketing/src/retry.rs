//! Timeout and retry for payment provider calls.
//!
//! Every attempt is bounded by a timeout. Transient failures
//! ([`PaymentError::is_transient`]) are retried after a short pause, up to
//! `max_retries` times; anything else is returned immediately.

use boxoffice_core::payment::PaymentError;
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry policy for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Bound on each attempt
    pub timeout: Duration,
    /// Pause before a retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            timeout: Duration::from_secs(5),
            delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given timeout and retry count.
    #[must_use]
    pub const fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            timeout,
            delay: Duration::from_millis(200),
        }
    }

    /// Set the pause before a retry.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `operation` under this policy.
    ///
    /// `name` labels logs and the `payment.provider.duration_seconds` histogram.
    ///
    /// # Errors
    ///
    /// Returns the last error once the operation fails permanently or the
    /// retries are used up. An attempt that exceeds the timeout counts as
    /// [`PaymentError::Timeout`].
    pub async fn run<T, F, Fut>(&self, name: &'static str, mut operation: F) -> Result<T, PaymentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PaymentError>>,
    {
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.timeout, operation())
                .await
                .unwrap_or(Err(PaymentError::Timeout));
            metrics::histogram!(
                "payment.provider.duration_seconds",
                "operation" => name,
                "outcome" => if outcome.is_ok() { "ok" } else { "error" }
            )
            .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(operation = name, attempt, "Provider call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation = name,
                        attempt,
                        error = %error,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => {
                    tracing::warn!(operation = name, attempt, error = %error, "Provider call failed");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(50), 1).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast_policy()
            .run("test", || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PaymentError::Transport("reset".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persistent_outage_gives_up_after_one_retry() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = fast_policy()
            .run("test", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(PaymentError::Rejected { status: 503, message: "down".into() })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = fast_policy()
            .run("test", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(PaymentError::Rejected { status: 400, message: "bad".into() })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let result: Result<(), _> = RetryPolicy::new(Duration::from_millis(10), 0)
            .run("test", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(PaymentError::Timeout));
    }
}
