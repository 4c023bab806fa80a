//! RecordingScheduler - a retry scheduler that never runs anything.
//!
//! Useful wherever a caller wants to see the retry directive itself (tests,
//! dry runs) rather than have the task re-executed.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{TaskEnvelope, TrackError};
use crate::ports::RetryScheduler;

/// One accepted `submit` call.
#[derive(Debug, Clone)]
pub struct Submission {
    pub envelope: TaskEnvelope,
    pub delay: Duration,
    pub attempt: u32,
}

#[derive(Debug, Default)]
pub struct RecordingScheduler {
    submissions: Mutex<Vec<Submission>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RetryScheduler for RecordingScheduler {
    async fn submit(
        &self,
        envelope: TaskEnvelope,
        delay: Duration,
        attempt: u32,
    ) -> Result<(), TrackError> {
        self.submissions
            .lock()
            .map_err(|_| TrackError::Scheduler("recording scheduler poisoned".to_string()))?
            .push(Submission {
                envelope,
                delay,
                attempt,
            });
        Ok(())
    }
}
