//! Queue module: task state, retry policy, and the in-memory queue that
//! re-runs tasks handed to it as a [`RetryScheduler`].

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryQueue;
pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use state::TaskState;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::{Outcome, TaskEnvelope, TaskId, TrackError};
use crate::observability::QueueCounts;
use crate::ports::RetryScheduler;

/// Final result of a task, as delivered to its [`TaskHandle`].
pub type TaskResult = Result<Outcome, TrackError>;

/// A leased task. The worker owns the lease and must `complete` it with the
/// result of the attempt it ran.
///
/// The queue manages state transitions; the worker executes side effects
/// and reports back.
#[async_trait]
pub trait TaskLease: Send {
    fn envelope(&self) -> &TaskEnvelope;

    /// Record the attempt's result. `RetryScheduled` leaves the task with the
    /// scheduler; every other result is final and wakes the task's handle.
    async fn complete(self: Box<Self>, result: TaskResult);
}

#[async_trait]
pub trait Queue: RetryScheduler {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskHandle, TrackError>;

    /// Lease one ready task, waiting until one is available.
    async fn lease(&self) -> Box<dyn TaskLease>;

    async fn counts_by_state(&self) -> QueueCounts;
}

/// Awaits the final result of an enqueued task.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: TaskId,
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskHandle {
    pub(crate) fn new(task_id: TaskId, rx: oneshot::Receiver<TaskResult>) -> Self {
        Self { task_id, rx }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Wait for the task to succeed, be abandoned or fail permanently.
    pub async fn wait(self) -> TaskResult {
        let task_id = self.task_id;
        self.rx.await.map_err(|_| {
            TrackError::Scheduler(format!("{task_id} was dropped before it completed"))
        })?
    }
}
