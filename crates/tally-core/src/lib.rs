//! tally-core
//!
//! Forwards analytics events, profile updates and funnel steps to a remote
//! tracking API, retrying failed deliveries a bounded number of times.
//!
//! # Modules
//! - **domain**: ids, envelopes, properties, outcomes, decisions, errors
//! - **codec**: `data=<base64 json>&test=N` request encoding
//! - **ports**: `Transport` and `RetryScheduler` seams
//! - **impls**: HTTP transport, recording scheduler
//! - **queue**: retry policy and the in-memory retry queue
//! - **typed**: tasks, handlers, registry
//! - **app**: builder, runtime, workers, `Tracker` facade
//! - **config**: `TrackerConfig` and its `TALLY_*` environment overlay

pub mod app;
pub mod codec;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod typed;

#[cfg(test)]
mod testing;

pub use app::{AppBuilder, BuildError, TrackOptions, Tracker};
pub use config::{ConfigError, TrackerConfig};
pub use domain::{Outcome, Properties, TrackError, TransportError, to_properties};
