//! Transport port - one delivery of an encoded payload.

use async_trait::async_trait;

use crate::codec::EncodedPayload;
use crate::domain::TransportError;

/// Sends `GET {endpoint}?{payload}` to the tracking host.
///
/// Returns `Ok(true)` when the remote recorded the event, `Ok(false)` when it
/// answered `200 OK` but declined to record it. Anything else is an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &EncodedPayload, endpoint: &str)
    -> Result<bool, TransportError>;
}
