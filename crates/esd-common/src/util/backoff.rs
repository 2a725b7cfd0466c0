//! Exponential backoff for calls that fail transiently, and bounded polling
//! for state that converges eventually.
//!
//! Nothing here sleeps for a fixed amount of time: every wait is derived from
//! a [`RetryConfig`] and every poll carries an explicit deadline.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{error, warn};

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = infinite)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied after every failed attempt
    pub backoff_multiplier: f64,
    /// Randomize each delay between 0.5x and 1.5x
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay to wait after the given number of consecutive failures
    /// (1-based), without jitter.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // NaN and negative products clamp to zero.
        Duration::from_secs_f64(secs.max(0.0).min(self.max_delay.as_secs_f64()))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// `max_attempts` is exhausted. The last error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => {
                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let delay = config.jittered(config.delay_for(attempt));
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PollError<E> {
    #[error("{operation} did not converge within {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },
    #[error("{0}")]
    Failed(E),
}

/// Poll `probe` until it yields `Some`, backing off between probes, and
/// give up once `timeout` has elapsed.
pub async fn poll_until<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    timeout: Duration,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = probe().await.map_err(PollError::Failed)? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::Timeout {
                operation: operation_name.to_string(),
                elapsed: now - started,
            });
        }

        let delay = config.jittered(config.delay_for(attempt)).min(deadline - now);
        tracing::debug!(
            operation = %operation_name,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Not converged yet"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(4), Duration::from_secs(8));
        assert_eq!(config.delay_for(5), Duration::from_secs(10));
        assert_eq!(config.delay_for(500), Duration::from_secs(10));
    }

    #[test]
    fn degenerate_multiplier_stays_in_range() {
        let negative = RetryConfig {
            backoff_multiplier: -2.0,
            jitter: false,
            ..fast()
        };
        assert_eq!(negative.delay_for(1), Duration::from_millis(1));
        assert_eq!(negative.delay_for(2), Duration::ZERO);
        assert!(negative.delay_for(3) <= negative.max_delay);

        let huge = RetryConfig {
            backoff_multiplier: f64::INFINITY,
            ..fast()
        };
        assert_eq!(huge.delay_for(3), huge.max_delay);

        let nan = RetryConfig {
            backoff_multiplier: f64::NAN,
            ..fast()
        };
        assert_eq!(nan.delay_for(2), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<i32, &str> = retry_with_backoff(&fast(), "op", |_| true, || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("fail")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<i32, &str> =
            retry_with_backoff(&fast(), "op", |e: &&str| *e != "fatal", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                }
            })
            .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<i32, &str> = retry_with_backoff(&fast(), "op", |_| true, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("always fails")
            }
        })
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn poll_returns_first_value() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<u32, PollError<&str>> =
            poll_until(&fast(), "converge", Duration::from_secs(5), || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    Ok(if n >= 3 { Some(n) } else { None })
                }
            })
            .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn poll_times_out() {
        let result: Result<(), PollError<&str>> =
            poll_until(&fast(), "never", Duration::from_millis(20), || async { Ok(None) }).await;

        match result {
            Err(PollError::Timeout { operation, elapsed }) => {
                assert_eq!(operation, "never");
                assert!(elapsed >= Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn poll_propagates_probe_error() {
        let result: Result<(), PollError<&str>> =
            poll_until(&fast(), "broken", Duration::from_secs(1), || async { Err("boom") }).await;
        assert_eq!(result, Err(PollError::Failed("boom")));
    }
}
