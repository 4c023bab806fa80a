//! Task identifiers.
//!
//! ULID based: sortable by creation time and generated without coordination,
//! so any worker or caller can mint one.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of one tracking task (shared by all of its attempts).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Mint a fresh id from the wall clock and random bits.
    pub fn generate() -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
