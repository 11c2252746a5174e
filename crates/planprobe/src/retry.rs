//! Bounded polling.
//!
//! Every wait in the scenario (field visibility, autocomplete suggestions,
//! a freshly opened tab reporting its URL, document load state) is a
//! poll-until-predicate loop with a fixed attempt budget. They all go
//! through [`poll_until`].

use crate::result::ProbeResult;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::{Duration, Instant};

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Maximum number of attempts (at least one is always made)
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 50)
    }
}

impl RetryPolicy {
    /// Constant-interval policy with an attempt budget
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Constant-interval policy whose attempts span roughly `timeout`
    #[must_use]
    pub fn within(timeout: Duration, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let attempts = (timeout.as_millis() / interval.as_millis()) as usize + 1;
        Self::new(interval, attempts)
    }

    /// Set the attempt budget
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Sum of all delays the policy can sleep through
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1) as u32)
    }
}

/// A value accepted by the predicate
#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    /// The accepted value
    pub value: T,
    /// Number of attempts made
    pub attempts: usize,
    /// Time spent polling
    pub elapsed: Duration,
}

/// The attempt budget ran out
#[derive(Debug, Clone)]
pub struct RetryExhausted<T> {
    /// Last value the probe produced, if any attempt succeeded
    pub last_value: Option<T>,
    /// Last probe error, if the final attempts failed
    pub last_error: Option<String>,
    /// Number of attempts made
    pub attempts: usize,
    /// Time spent polling
    pub elapsed: Duration,
}

impl<T: Debug> std::fmt::Display for RetryExhausted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s) ({:.2}s)",
            self.attempts,
            self.elapsed.as_secs_f64()
        )?;
        if let Some(ref value) = self.last_value {
            write!(f, ", last value {value:?}")?;
        }
        if let Some(ref err) = self.last_error {
            write!(f, ", last error: {err}")?;
        }
        Ok(())
    }
}

impl<T> RetryExhausted<T> {
    /// Elapsed time in whole milliseconds
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Poll `probe` until `accept` approves its value or the policy is spent.
///
/// Probe errors count as failed attempts; they never abort the loop.
pub async fn poll_until<T, F, Fut, P>(
    policy: &RetryPolicy,
    mut probe: F,
    mut accept: P,
) -> Result<RetryOutcome<T>, RetryExhausted<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<T>>,
    P: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut last_value = None;
    let mut last_error: Option<String>;
    let mut attempts = 0;

    loop {
        attempts += 1;
        last_error = match probe().await {
            Ok(value) if accept(&value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts,
                    elapsed: start.elapsed(),
                });
            }
            Ok(value) => {
                last_value = Some(value);
                None
            }
            Err(err) => Some(err.to_string()),
        };

        if attempts >= max_attempts {
            return Err(RetryExhausted {
                last_value,
                last_error,
                attempts,
                elapsed: start.elapsed(),
            });
        }

        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::ProbeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    mod retry_policy {
        use super::*;

        #[test]
        fn test_within_spans_timeout() {
            let policy = RetryPolicy::within(Duration::from_secs(1), Duration::from_millis(100));
            assert_eq!(policy.max_attempts, 11);
            assert_eq!(policy.budget(), Duration::from_secs(1));
        }

        #[test]
        fn test_within_zero_timeout_makes_one_attempt() {
            let policy = RetryPolicy::within(Duration::ZERO, Duration::from_millis(100));
            assert_eq!(policy.max_attempts, 1);
            assert_eq!(policy.budget(), Duration::ZERO);
        }

        #[test]
        fn test_budget_is_constant_interval() {
            let policy = RetryPolicy::new(Duration::from_millis(50), 5);
            assert_eq!(policy.budget(), Duration::from_millis(200));
            assert_eq!(policy.with_max_attempts(0).budget(), Duration::ZERO);
        }
    }

    mod poll {
        use super::*;

        #[tokio::test]
        async fn test_immediate_accept() {
            let policy = RetryPolicy::new(Duration::from_millis(1), 3);
            let outcome = poll_until(&policy, || async { Ok(7) }, |v| *v == 7)
                .await
                .unwrap();
            assert_eq!(outcome.value, 7);
            assert_eq!(outcome.attempts, 1);
        }

        #[tokio::test]
        async fn test_eventual_accept() {
            let counter = Arc::new(AtomicUsize::new(0));
            let policy = RetryPolicy::new(Duration::from_millis(1), 10);
            let outcome = poll_until(
                &policy,
                || {
                    let counter = Arc::clone(&counter);
                    async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
                },
                |v| *v >= 2,
            )
            .await
            .unwrap();
            assert_eq!(outcome.attempts, 3);
            assert_eq!(outcome.value, 2);
        }

        #[tokio::test]
        async fn test_exhaustion_keeps_last_value() {
            let policy = RetryPolicy::new(Duration::from_millis(1), 4);
            let err = poll_until(
                &policy,
                || async { Ok("about:blank".to_string()) },
                |url| url != "about:blank",
            )
            .await
            .unwrap_err();
            assert_eq!(err.attempts, 4);
            assert_eq!(err.last_value.as_deref(), Some("about:blank"));
            assert!(err.to_string().contains("4 attempt(s)"));
        }

        #[tokio::test]
        async fn test_probe_errors_are_retried() {
            let counter = Arc::new(AtomicUsize::new(0));
            let policy = RetryPolicy::new(Duration::from_millis(1), 5);
            let outcome = poll_until(
                &policy,
                || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(ProbeError::page("context destroyed"))
                        } else {
                            Ok(true)
                        }
                    }
                },
                |ready| *ready,
            )
            .await
            .unwrap();
            assert_eq!(outcome.attempts, 2);
        }

        #[tokio::test]
        async fn test_later_value_clears_earlier_error() {
            let counter = Arc::new(AtomicUsize::new(0));
            let policy = RetryPolicy::new(Duration::from_millis(1), 2);
            let err = poll_until(
                &policy,
                || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(ProbeError::page("navigating"))
                        } else {
                            Ok(false)
                        }
                    }
                },
                |ready| *ready,
            )
            .await
            .unwrap_err();
            assert_eq!(err.last_value, Some(false));
            assert!(err.last_error.is_none());
        }

        #[tokio::test]
        async fn test_exhaustion_reports_last_error() {
            let policy = RetryPolicy::new(Duration::from_millis(1), 2);
            let err = poll_until(
                &policy,
                || async { Err::<bool, _>(ProbeError::page("detached")) },
                |_| true,
            )
            .await
            .unwrap_err();
            assert!(err.last_value.is_none());
            assert!(err.last_error.unwrap().contains("detached"));
        }
    }
}
