//! Retry with exponential backoff for fallible asynchronous operations
//!
//! This is the sole retry primitive in the pipeline. It covers completion
//! callback delivery and outbound HTTP calls where transient failure is
//! expected. Provider failover is not retry: the LLM router rotates to a
//! different backend instead of re-attempting the same one.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff parameters for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy for collaborator HTTP calls: fewer attempts, same backoff curve.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            ..Self::default()
        }
    }
}

/// Invoke `operation` until it succeeds or `policy.max_attempts` is exhausted.
///
/// On success the result is returned immediately. On failure, if attempts
/// remain, sleeps for the current delay, multiplies the delay by the backoff
/// factor capped at `max_delay`, and retries. The final failure propagates
/// unchanged; a terminal failure is never swallowed.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt >= policy.max_attempts.max(1) => {
                warn!(attempt, error = %error, "final attempt failed");
                return Err(error);
            }
            Err(error) => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(policy.backoff_factor).min(policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_success_immediately_without_sleeping() {
        let start = tokio::time::Instant::now();
        let result: Result<u32, &str> = retry(&policy(5), || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds_with_expected_backoff() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<&str, String> = retry(&policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("transient failure {n}"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps: initial_delay, then initial_delay * backoff_factor.
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_max_attempts_and_propagates_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = retry(&policy(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure on attempt {n}")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.unwrap_err(), "failure on attempt 4");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_capped_at_max_delay() {
        let calls = AtomicU32::new(0);
        let capped = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        };
        let start = tokio::time::Instant::now();

        let _: Result<(), &str> = retry(&capped, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;

        // Sleeps: 10s, then min(20, 15) = 15s, then min(30, 15) = 15s.
        assert_eq!(start.elapsed(), Duration::from_secs(10 + 15 + 15));
    }
}
