//! Bounded retry for single fetch operations

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{GarminError, Result};
use crate::fetch::Fetched;

/// How often and how patiently a failed fetch is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before attempt `n + 1`; the last entry repeats
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::from_secs(2), Duration::from_secs(5)],
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_attempts` without sleeping (for testing)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Vec::new(),
        }
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(index).copied().unwrap_or(Duration::ZERO)
    }
}

/// Typed result of a retried operation
#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    /// Confirmed absence; never retried
    NotAvailable,
    /// Gave up; the error of the last attempt
    Skipped(GarminError),
}

/// Run `op` until it yields data or a confirmed absence, the policy is
/// exhausted, or a non-retryable error occurs.
///
/// Fatal errors are returned as `Err` so the caller can abort the run; every
/// other failure becomes [`Outcome::Skipped`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<Outcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Fetched<T>>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(Fetched::Data(value)) => return Ok(Outcome::Done(value)),
            Ok(Fetched::NotAvailable) => return Ok(Outcome::NotAvailable),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    op = what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Retrying in {:?}",
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => {
                debug!(op = what, attempt, error = %e, "Giving up");
                return Ok(Outcome::Skipped(e));
            }
        }
    }
}
