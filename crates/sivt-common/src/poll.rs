//! Bounded polling for asynchronous convergence (package reconcile, node
//! replacement, controller boot).
//!
//! Two budgets exist: wall-clock ([`wait_with_timeout`]) and a fixed number
//! of polls ([`poll_attempts`]). Both fail with [`Error::Timeout`] when the
//! budget runs out; running out is never treated as success.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{Error, Result};

/// Result type for polling check functions.
///
/// - `Ok(Some(value))` - Condition met, return the value
/// - `Ok(None)` - Condition not met yet, keep polling
/// - `Err(e)` - Fatal error, stop polling immediately
pub type PollResult<T> = std::result::Result<Option<T>, Error>;

/// Wall-clock budget for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollBudget {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Poll `check_fn` every `interval` until it yields a value, fails, or
/// `timeout` elapses.
pub async fn wait_with_timeout<T, F, Fut>(
    budget: PollBudget,
    description: &str,
    mut check_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    let start = Instant::now();

    loop {
        match check_fn().await? {
            Some(value) => return Ok(value),
            None => {
                if start.elapsed() + budget.interval > budget.timeout {
                    return Err(Error::timeout(description));
                }
                debug!("Waiting for {}...", description);
                tokio::time::sleep(budget.interval).await;
            }
        }
    }
}

/// Poll `check_fn` at most `attempts` times, sleeping `interval` between
/// polls.
pub async fn poll_attempts<T, F, Fut>(
    attempts: u32,
    interval: Duration,
    description: &str,
    mut check_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    for attempt in 1..=attempts {
        if let Some(value) = check_fn().await? {
            return Ok(value);
        }
        debug!(attempt, attempts, "Waiting for {}...", description);
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(Error::timeout(description))
}
