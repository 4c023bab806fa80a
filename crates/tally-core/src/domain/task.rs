use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// TaskType + payload + retry bookkeeping: everything a worker needs to run
/// one attempt of a task.
///
/// `attempt` is 1-based and owned by the scheduler; handlers never see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_id: TaskId,
    task_type: TaskType,
    payload: serde_json::Value,
    attempt: u32,
    raise_on_exhaustion: bool,
}

impl TaskEnvelope {
    pub fn new(task_id: TaskId, task_type: TaskType, payload: serde_json::Value) -> Self {
        Self {
            task_id,
            task_type,
            payload,
            attempt: 1,
            raise_on_exhaustion: false,
        }
    }

    /// Surface the final transport error to the caller once retries run out,
    /// instead of logging it.
    pub fn with_raise_on_exhaustion(mut self, raise: bool) -> Self {
        self.raise_on_exhaustion = raise;
        self
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn raise_on_exhaustion(&self) -> bool {
        self.raise_on_exhaustion
    }

    /// The same task, stamped for its next attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}
