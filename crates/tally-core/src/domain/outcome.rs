//! Outcome model: what one attempt of a tracking task ended with.

use std::time::Duration;

/// Result of running a single attempt.
///
/// `Delivered` and `Abandoned` are final; `RetryScheduled` means the task was
/// handed back to the scheduler and will run again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The remote answered. `recorded` is false when it accepted the request
    /// but chose not to store the event (e.g. a timestamp outside its window).
    Delivered { recorded: bool },

    RetryScheduled { next_attempt: u32, delay: Duration },

    /// Retries ran out and the caller did not ask for the error to be raised.
    Abandoned { attempts: u32, reason: String },
}

impl Outcome {
    pub fn is_final(&self) -> bool {
        !matches!(self, Outcome::RetryScheduled { .. })
    }

    /// What a caller of the tracking API sees: `true` only when the event was
    /// stored remotely.
    pub fn recorded(&self) -> bool {
        matches!(self, Outcome::Delivered { recorded: true })
    }
}
