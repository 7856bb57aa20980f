//! Exponential backoff for outbox relay steps.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Backoff schedule for a retried operation.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failure.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt with no delay.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the delay that follows `delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.multiplier).min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds or `config.max_attempts` is reached.
///
/// The closure receives the 1-based attempt number. An error for which
/// `is_transient` returns false is returned at once without backoff. The last
/// error is returned when every attempt failed.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    is_transient: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !is_transient(&error) {
                    tracing::warn!(attempt, error = %error, "Operation failed permanently");
                    return Err(error);
                }

                if attempt >= config.max_attempts.max(1) {
                    tracing::warn!(attempt, error = %error, "Operation failed after all retries");
                    return Err(error);
                }

                tracing::debug!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );

                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
