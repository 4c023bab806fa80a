//! Typed - the task API.
//!
//! Task types are checked at compile time and bound to their handler once,
//! at registration.
//!
//! # Two layers
//! - **typed**: `Task`, `Handler<T>`
//! - **dyn**: `DynHandler`, object safe, used by the runtime

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, Handler, TrackingHandler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::{Task, TrackEvent, TrackFunnel, TrackPeople};
