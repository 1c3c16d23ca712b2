//! Request pacing for Garmin Connect
//!
//! Requests are issued one at a time; the limiter spaces them out and backs
//! off exponentially while the service answers 429.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Initial backoff added after the first 429
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Maximum backoff delay (5 minutes)
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct State {
    /// Last request time
    last_request: Option<Instant>,
    /// Current backoff delay
    backoff: Duration,
    /// Consecutive rate limit hits
    consecutive_429s: u32,
}

/// Sequential rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum delay between requests
    min_delay: Duration,
    /// Backoff multiplier
    backoff_multiplier: f64,
    state: Mutex<State>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl RateLimiter {
    /// Create a rate limiter spacing requests by at least `min_delay`
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            backoff_multiplier: 2.0,
            state: Mutex::new(State {
                last_request: None,
                backoff: Duration::ZERO,
                consecutive_429s: 0,
            }),
        }
    }

    /// No spacing at all (for testing)
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait before making the next request
    pub async fn wait(&self) {
        let wait_time = {
            let state = self.state();
            state.last_request.and_then(|last| {
                let required = self.min_delay + state.backoff;
                required.checked_sub(last.elapsed())
            })
        };

        if let Some(wait_time) = wait_time.filter(|d| !d.is_zero()) {
            tokio::time::sleep(wait_time).await;
        }
        self.state().last_request = Some(Instant::now());
    }

    /// Handle a successful request
    pub fn on_success(&self) {
        let mut state = self.state();
        state.backoff = Duration::ZERO;
        state.consecutive_429s = 0;
    }

    /// Handle a rate limit (HTTP 429) response
    pub fn on_rate_limit(&self) {
        let mut state = self.state();
        state.consecutive_429s += 1;
        let next = if state.backoff.is_zero() {
            INITIAL_BACKOFF
        } else {
            Duration::from_secs_f64(state.backoff.as_secs_f64() * self.backoff_multiplier)
        };
        state.backoff = next.min(MAX_BACKOFF);
    }

    /// Get the current backoff duration
    pub fn current_backoff(&self) -> Duration {
        self.state().backoff
    }

    /// Consecutive 429 responses since the last success
    pub fn consecutive_rate_limits(&self) -> u32 {
        self.state().consecutive_429s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.current_backoff(), Duration::ZERO);

        limiter.on_rate_limit();
        assert_eq!(limiter.current_backoff(), Duration::from_secs(1));

        limiter.on_rate_limit();
        assert_eq!(limiter.current_backoff(), Duration::from_secs(2));

        limiter.on_rate_limit();
        assert_eq!(limiter.current_backoff(), Duration::from_secs(4));
        assert_eq!(limiter.consecutive_rate_limits(), 3);
    }

    #[test]
    fn test_backoff_max() {
        let limiter = RateLimiter::default();

        // Hit rate limit many times
        for _ in 0..20 {
            limiter.on_rate_limit();
        }

        assert_eq!(limiter.current_backoff(), MAX_BACKOFF);
    }

    #[test]
    fn test_reset_on_success() {
        let limiter = RateLimiter::default();

        limiter.on_rate_limit();
        limiter.on_rate_limit();
        limiter.on_success();

        assert_eq!(limiter.current_backoff(), Duration::ZERO);
        assert_eq!(limiter.consecutive_rate_limits(), 0);
    }

    #[tokio::test]
    async fn test_wait_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_unlimited_does_not_sleep() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
