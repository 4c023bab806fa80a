//! RetryScheduler port - "run this task again later".

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{TaskEnvelope, TrackError};

/// Accepts a task for re-execution after `delay`.
///
/// The runtime calls this and returns immediately; it never sleeps waiting
/// for the retry. `attempt` is the 1-based number the re-executed attempt
/// will carry (it equals `envelope.attempt()`).
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    async fn submit(
        &self,
        envelope: TaskEnvelope,
        delay: Duration,
        attempt: u32,
    ) -> Result<(), TrackError>;
}
