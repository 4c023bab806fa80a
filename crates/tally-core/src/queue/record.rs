//! Task record: state + the envelope of the current attempt.

use super::TaskState;
use crate::domain::TaskEnvelope;

/// Single source of truth for a live task; the ready and scheduled
/// structures hold TaskIds only. Records are dropped once the task finishes.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Envelope of the latest attempt; replaced on every retry.
    pub envelope: TaskEnvelope,
    pub state: TaskState,
}

impl TaskRecord {
    pub fn new(envelope: TaskEnvelope) -> Self {
        Self {
            envelope,
            state: TaskState::Queued,
        }
    }

    pub fn start_attempt(&mut self) {
        self.state = TaskState::Running;
    }

    pub fn schedule_retry(&mut self, envelope: TaskEnvelope) {
        self.envelope = envelope;
        self.state = TaskState::RetryScheduled;
    }

    /// RetryScheduled -> Queued.
    pub fn requeue(&mut self) {
        self.state = TaskState::Queued;
    }
}
