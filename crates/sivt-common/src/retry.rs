//! Bounded retry for actuator calls that fail transiently.
//!
//! Two shapes are used by the workflows: a fixed-delay budget (cluster
//! existence checks, controller readiness) and exponential backoff with
//! jitter for everything else. Errors that are not retryable end the loop
//! on the first occurrence.
//!
//! ```ignore
//! let exists = retry_with_backoff(
//!     &RetryConfig::fixed(6, Duration::from_secs(10)),
//!     "cluster exists",
//!     || async { clusters.exists(name).await },
//! )
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::Result;

/// Retry budget for a single operation
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failure
    pub backoff_multiplier: f64,
    /// Scale each delay by a random factor in 0.5..1.5
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with the default delays and `attempts` tries
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// `attempts` tries spaced exactly `delay` apart
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Run `operation` until it succeeds, returns a non-retryable error, or the
/// attempt budget is spent. The last error is returned on exhaustion.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt >= config.max_attempts.max(1) {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let wait = if config.jitter {
                    let factor = rand::thread_rng().gen_range(0.5..1.5);
                    Duration::from_secs_f64(delay.as_secs_f64() * factor)
                } else {
                    delay
                };

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(wait).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
