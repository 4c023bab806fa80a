//! Tracker - the public tracking API.
//!
//! Every call becomes a task on the in-process queue; the `track_*` methods
//! wait for the task's final result, `submit` hands back a [`TaskHandle`].

use std::sync::Arc;

use super::builder::{AppBuilder, BuildError};
use super::worker::WorkerGroup;
use crate::config::TrackerConfig;
use crate::domain::{Properties, TaskEnvelope, TaskId, TaskType, TrackError};
use crate::observability::QueueCounts;
use crate::queue::{InMemoryQueue, Queue, TaskHandle};
use crate::typed::{Task, TrackEvent, TrackFunnel, TrackPeople};

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// API token for this call; the configured token otherwise.
    pub token: Option<String>,
    /// Test mode for this call; `test_only` from the config otherwise.
    pub test: Option<bool>,
    /// Return `RetriesExhausted` instead of `Ok(false)` when retries run out.
    pub raise_on_exhaustion: bool,
}

impl TrackOptions {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = Some(test);
        self
    }

    pub fn raising(mut self) -> Self {
        self.raise_on_exhaustion = true;
        self
    }
}

pub struct Tracker {
    config: TrackerConfig,
    queue: Arc<InMemoryQueue>,
    workers: WorkerGroup,
}

impl Tracker {
    pub(crate) fn new(
        config: TrackerConfig,
        queue: Arc<InMemoryQueue>,
        workers: WorkerGroup,
    ) -> Self {
        Self {
            config,
            queue,
            workers,
        }
    }

    /// Tracker over HTTP with the default worker count.
    pub fn from_config(config: TrackerConfig) -> Result<Self, BuildError> {
        Ok(AppBuilder::new(config)
            .with_tracking_handlers()?
            .build()?
            .start())
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Queue `task` without waiting for it to run.
    pub async fn submit<T: Task>(
        &self,
        task: T,
        raise_on_exhaustion: bool,
    ) -> Result<TaskHandle, TrackError> {
        let payload = serde_json::to_value(&task).map_err(TrackError::Encoding)?;
        let envelope = TaskEnvelope::new(TaskId::generate(), TaskType::new(T::TYPE), payload)
            .with_raise_on_exhaustion(raise_on_exhaustion);
        self.queue.enqueue(envelope).await
    }

    /// Record `event`. `Ok(true)` only when the remote stored it.
    pub async fn track_event(
        &self,
        event: &str,
        properties: Option<Properties>,
        options: TrackOptions,
    ) -> Result<bool, TrackError> {
        let task = TrackEvent {
            event: event.to_string(),
            properties,
            token: options.token,
            test: options.test,
        };
        self.run(task, options.raise_on_exhaustion).await
    }

    /// Update the profile of `distinct_id`.
    pub async fn track_people(
        &self,
        distinct_id: &str,
        set: Option<Properties>,
        increment: Option<Properties>,
        options: TrackOptions,
    ) -> Result<bool, TrackError> {
        let task = TrackPeople {
            distinct_id: distinct_id.to_string(),
            set,
            increment,
            token: options.token,
            test: options.test,
        };
        self.run(task, options.raise_on_exhaustion).await
    }

    /// Record `step` of `funnel`. `properties` must carry a `distinct_id`.
    pub async fn track_funnel(
        &self,
        funnel: &str,
        step: &str,
        goal: &str,
        properties: Properties,
        options: TrackOptions,
    ) -> Result<bool, TrackError> {
        let task = TrackFunnel {
            funnel: funnel.to_string(),
            step: step.to_string(),
            goal: goal.to_string(),
            properties,
            token: options.token,
            test: options.test,
        };
        self.run(task, options.raise_on_exhaustion).await
    }

    pub async fn counts(&self) -> QueueCounts {
        self.queue.counts_by_state().await
    }

    /// Stop the workers once their in-flight attempts finish. Queued and
    /// scheduled tasks are dropped.
    pub async fn shutdown(self) {
        self.workers.shutdown_and_join().await;
    }

    async fn run<T: Task>(&self, task: T, raise_on_exhaustion: bool) -> Result<bool, TrackError> {
        let outcome = self.submit(task, raise_on_exhaustion).await?.wait().await?;
        Ok(outcome.recorded())
    }
}
