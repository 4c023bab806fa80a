//! Retry policy: how long to wait and how many times to try again.

use std::time::Duration;

/// Fixed-delay retry policy.
///
/// `max_retries` counts re-executions after the first attempt, so a task runs
/// at most `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between a failed attempt and the next one.
    pub delay: Duration,

    /// Number of retries allowed after the first attempt.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self { delay, max_retries }
    }

    /// Run once, never retry.
    pub fn no_retry() -> Self {
        Self::fixed(Duration::ZERO, 0)
    }

    /// Delay before the attempt following `attempt` (1-based). Constant.
    pub fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Whether another attempt may follow attempt number `attempt`.
    pub fn has_retries_remaining(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    /// Five retries, five minutes apart.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(300), 5)
    }
}
