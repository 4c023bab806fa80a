//! Ports - seams to the collaborators the tracking core depends on.
//!
//! - [`RetryScheduler`]: re-runs a task after a delay (in-memory queue,
//!   durable queue, test double)
//! - [`Transport`]: delivers an encoded payload to the tracking host

pub mod scheduler;
pub mod transport;

pub use self::scheduler::RetryScheduler;
pub use self::transport::Transport;
