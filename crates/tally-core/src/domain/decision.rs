//! Decision model: what to do after an attempt fails with a transient error.
//!
//! The Decider is pure: given the attempt number and the error it returns the
//! next action. Carrying it out (submitting to the scheduler, surfacing the
//! error) is the runtime's job.

use std::time::Duration;

use super::TrackError;
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run the task again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Stop retrying.
    GiveUp { reason: String },
}

pub trait Decider: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn decide(&self, attempt: u32, error: &TrackError) -> Decision;
}

/// Retries transient errors with the policy's fixed delay until the retry
/// budget is spent. Permanent errors are never retried.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, attempt: u32, error: &TrackError) -> Decision {
        if !error.is_retryable() {
            return Decision::GiveUp {
                reason: format!("not retryable: {error}"),
            };
        }
        if !self.retry_policy.has_retries_remaining(attempt) {
            return Decision::GiveUp {
                reason: format!(
                    "Max retries reached: {}/{}",
                    attempt.saturating_sub(1),
                    self.retry_policy.max_retries
                ),
            };
        }
        let delay = self.retry_policy.next_delay(attempt);
        Decision::Retry {
            delay,
            reason: format!(
                "Retry {}/{} after {:?}",
                attempt,
                self.retry_policy.max_retries,
                delay
            ),
        }
    }
}
