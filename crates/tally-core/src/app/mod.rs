//! App - wiring and the public tracking API.
//!
//! - **AppBuilder**: registers handlers, validates, starts
//! - **Runtime**: one attempt of a task, then retry/give-up
//! - **WorkerGroup**: workers leasing from the queue
//! - **Tracker**: the facade callers use

pub mod builder;
pub mod runtime;
pub mod tracker;
pub mod worker;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::runtime::Runtime;
pub use self::tracker::{TrackOptions, Tracker};
pub use self::worker::WorkerGroup;
