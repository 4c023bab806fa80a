//! Domain model (ids, envelopes, properties, outcomes, decisions, errors).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod properties;
pub mod task;

pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ErrorKind, TrackError, TransportError};
pub use ids::TaskId;
pub use outcome::Outcome;
pub use properties::{
    Properties, apply_funnel_fields, attach_token, resolve_test_flag,
    rewrite_reserved_people_keys, to_properties,
};
pub use task::{TaskEnvelope, TaskType};
