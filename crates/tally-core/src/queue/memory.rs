//! In-memory queue implementation.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, oneshot};
use tokio::time::Instant;
use tracing::debug;

use super::{Queue, TaskHandle, TaskLease, TaskRecord, TaskResult, TaskState};
use crate::domain::{Outcome, TaskEnvelope, TaskId, TrackError};
use crate::observability::QueueCounts;
use crate::ports::RetryScheduler;

/// Scheduled task entry for the retry heap.
///
/// Ordering is reversed so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    next_run_at: Instant,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

#[derive(Default)]
struct InMemoryQueueState {
    records: HashMap<TaskId, TaskRecord>,

    ready: VecDeque<TaskId>,

    /// Retries waiting out their delay.
    scheduled: BinaryHeap<ScheduledTask>,

    /// Completion channels, removed when the task reaches a final state.
    waiters: HashMap<TaskId, oneshot::Sender<TaskResult>>,

    succeeded: usize,
    dead: usize,
}

impl InMemoryQueueState {
    /// Move tasks from scheduled to ready if their time has come.
    fn promote_scheduled_tasks(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.task_id)
                && record.state == TaskState::RetryScheduled
            {
                record.requeue();
                self.ready.push_back(entry.task_id);
            }
        }
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            succeeded: self.succeeded,
            dead: self.dead,
            ..QueueCounts::default()
        };
        for record in self.records.values() {
            match record.state {
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
            }
        }
        counts
    }

    /// Forget the task and hand `result` to whoever waits on it.
    fn finish(&mut self, task_id: TaskId, result: TaskResult) {
        if self.records.remove(&task_id).is_none() {
            return;
        }
        match &result {
            Ok(Outcome::Delivered { .. }) => self.succeeded += 1,
            _ => self.dead += 1,
        }
        if let Some(tx) = self.waiters.remove(&task_id) {
            // the caller may have stopped waiting
            let _ = tx.send(result);
        }
    }
}

/// Queue that re-runs tasks in-process once their retry delay has passed.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a live task; `None` once it has finished.
    pub async fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        let state = self.state.lock().await;
        state.records.get(&task_id).map(|r| r.state)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskHandle, TrackError> {
        let task_id = envelope.task_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            if state.records.contains_key(&task_id) {
                return Err(TrackError::Scheduler(format!("{task_id} is already queued")));
            }
            state.records.insert(task_id, TaskRecord::new(envelope));
            state.waiters.insert(task_id, tx);
            state.ready.push_back(task_id);
        }
        self.notify.notify_one();
        Ok(TaskHandle::new(task_id, rx))
    }

    async fn lease(&self) -> Box<dyn TaskLease> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled_tasks();

                while let Some(task_id) = state.ready.pop_front() {
                    if let Some(record) = state.records.get_mut(&task_id) {
                        record.start_attempt();
                        return Box::new(InMemoryLease {
                            envelope: record.envelope.clone(),
                            queue: Arc::clone(&self.state),
                        });
                    }
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            match next_wake {
                Some(wake_time) => {
                    tokio::select! {
                        _ = self.notify.notified() => {},
                        _ = tokio::time::sleep_until(wake_time) => {},
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    async fn counts_by_state(&self) -> QueueCounts {
        self.state.lock().await.counts_by_state()
    }
}

#[async_trait]
impl RetryScheduler for InMemoryQueue {
    async fn submit(
        &self,
        envelope: TaskEnvelope,
        delay: Duration,
        attempt: u32,
    ) -> Result<(), TrackError> {
        let task_id = envelope.task_id();
        if envelope.attempt() != attempt {
            return Err(TrackError::Scheduler(format!(
                "{task_id}: attempt {attempt} does not match envelope attempt {}",
                envelope.attempt()
            )));
        }

        let next_run_at = Instant::now().checked_add(delay).ok_or_else(|| {
            TrackError::Scheduler(format!("{task_id}: retry delay {delay:?} is out of range"))
        })?;
        {
            let mut state = self.state.lock().await;
            let Some(record) = state.records.get_mut(&task_id) else {
                return Err(TrackError::Scheduler(format!(
                    "{task_id} is not queued (unknown or already finished)"
                )));
            };
            record.schedule_retry(envelope);
            state.scheduled.push(ScheduledTask {
                next_run_at,
                task_id,
            });
        }
        debug!(%task_id, attempt, ?delay, "retry scheduled");

        // a sleeping worker may need to wake earlier than it planned
        self.notify.notify_one();
        Ok(())
    }
}

struct InMemoryLease {
    envelope: TaskEnvelope,
    queue: Arc<Mutex<InMemoryQueueState>>,
}

#[async_trait]
impl TaskLease for InMemoryLease {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    async fn complete(self: Box<Self>, result: TaskResult) {
        let task_id = self.envelope.task_id();
        // the scheduler already owns the record
        if matches!(result, Ok(Outcome::RetryScheduled { .. })) {
            return;
        }
        self.queue.lock().await.finish(task_id, result);
    }
}
