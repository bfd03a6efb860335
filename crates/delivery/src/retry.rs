//! Backoff delays between webhook attempts.
//!
//! Pure computation only; the engine owns the actual waiting.

use std::time::Duration;

use relay_core::config::{RetryStrategy, WebhookConfig};

/// Upper bound on any single backoff delay.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,
    pub base_delay: Duration,
    /// Total attempts allowed, including the first. Always at least 1.
    pub max_attempts: u32,
    pub ceiling: Duration,
}

impl RetryPolicy {
    pub fn new(strategy: RetryStrategy, base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            strategy,
            base_delay,
            max_attempts: max_attempts.max(1),
            ceiling: MAX_DELAY,
        }
    }

    pub fn from_config(cfg: &WebhookConfig) -> Self {
        Self::new(
            cfg.retry_strategy,
            Duration::from_millis(cfg.retry_delay),
            cfg.max_retries,
        )
    }

    /// Delay to wait after attempt number `attempt` (1-based) fails.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = match self.strategy {
            RetryStrategy::Fixed => self.base_delay,
            RetryStrategy::Exponential => {
                let exponent = attempt.max(1) - 1;
                let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.ceiling)
    }

    /// Whether another attempt may follow attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
