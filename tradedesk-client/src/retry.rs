//! Exponential-backoff retry for idempotent reads.

use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;

/// Upper bound on any single backoff sleep.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt` (1-based retries): `base * 2^(attempt-1)`,
    /// saturating at [`MAX_DELAY`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        2u32.checked_pow(attempt - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub fn run<T>(
        &self,
        what: &str,
        mut call: impl FnMut() -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            match call() {
                Ok(v) => return Ok(v),
                Err(e) if e.kind().is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(%what, attempt, error = %e, "retrying read");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
