//! Retry policy with exponential backoff.

use std::time::Duration;

use tradekit_core::error::BrokerError;

/// Bounded retry with exponential backoff.
///
/// Rate-limit responses use the broker's requested delay instead of the
/// computed backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (0-based) after `error`.
    /// Returns None once the attempt budget is spent or the error is not
    /// retryable.
    pub fn delay_for(&self, attempt: u32, error: &BrokerError) -> Option<Duration> {
        if attempt >= self.max_retries || !error.is_transient() {
            return None;
        }

        let delay = match error {
            BrokerError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self.base_delay * 2u32.saturating_pow(attempt),
        };
        Some(delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}
