//! Impls - port implementations.
//!
//! - **HttpTransport**: one unpooled HTTP GET per delivery, via reqwest
//! - **RecordingScheduler**: retry scheduler that only records what it was asked
//!
//! The production scheduler is [`crate::queue::InMemoryQueue`].

pub mod http;
pub mod recording;

pub use self::http::HttpTransport;
pub use self::recording::{RecordingScheduler, Submission};
