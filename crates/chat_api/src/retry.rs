use std::time::Duration;

/// Retries after the initial attempt.
pub const MAX_RETRIES: u32 = 7;
/// Delay before the first retry; each later retry doubles it.
pub const BASE_DELAY: Duration = Duration::from_secs(2);

/// Backoff schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(30);
        self.base_delay.saturating_mul(2u32.saturating_pow(exponent))
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Rate limiting and server-side failures are worth another attempt.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}
