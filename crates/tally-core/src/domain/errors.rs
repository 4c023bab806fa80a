//! Errors - failure taxonomy for tracking tasks.
//!
//! Every failure is classified by [`ErrorKind`] so the runtime can decide
//! whether a retry makes sense without looking at messages.

use std::time::Duration;

use thiserror::Error;

/// Operational classification of a failure.
///
/// - Transient: the same call may succeed later (retry)
/// - Permanent: input/programming error, retrying cannot help
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Failure talking to the tracking host.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid host `{0}`")]
    InvalidHost(String),

    #[error("could not connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("the tracking request failed. Non-200 response was: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
}

/// Task-level error returned by handlers, the runtime and the tracker.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("a `{field}` must be given to record a funnel event")]
    MissingRequiredField { field: &'static str },

    #[error("properties could not be encoded: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("tracking request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("handler not found for task_type={0}")]
    HandlerNotFound(String),

    #[error("task payload could not be decoded: {0}")]
    InvalidPayload(String),

    #[error("retry scheduler: {0}")]
    Scheduler(String),

    /// The attempt did not run to completion (it panicked or was cancelled).
    #[error("attempt aborted: {0}")]
    Worker(String),
}

impl TrackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackError::Transport(_) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
