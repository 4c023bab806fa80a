//! Task state machine for the queue.

use serde::{Deserialize, Serialize};

/// States of a task the queue still holds:
/// - Queued -> Running
/// - Running -> RetryScheduled -> Queued (until retries run out)
///
/// A task that leaves Running with a final result is removed from the queue
/// and only counted as succeeded or dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Ready to run immediately.
    Queued,

    /// Currently being executed by a worker.
    Running,

    /// Waiting out the retry delay.
    RetryScheduled,
}
