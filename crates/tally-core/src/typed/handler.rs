//! Handlers - execute one attempt of a typed task.
//!
//! Two layers:
//! - `Handler<T>`: typed, one impl per task
//! - `DynHandler`: object safe, decodes the JSON payload into `T` first
//!
//! [`TrackingHandler`] implements `Handler` for all three tracking tasks:
//! normalize properties, encode, deliver.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::task::{Task, TrackEvent, TrackFunnel, TrackPeople};
use crate::codec::PayloadCodec;
use crate::config::TrackerConfig;
use crate::domain::{TrackError, apply_funnel_fields, attach_token, resolve_test_flag};
use crate::ports::Transport;

/// Runs a task and reports whether the remote recorded it.
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T) -> Result<bool, TrackError>;
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: &serde_json::Value) -> Result<bool, TrackError>;
    fn task_type(&self) -> &str;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: &serde_json::Value) -> Result<bool, TrackError> {
        let task: T = serde_json::from_value(payload.clone())
            .map_err(|e| TrackError::InvalidPayload(format!("{}: {e}", T::TYPE)))?;
        self.handler.handle(task).await
    }

    fn task_type(&self) -> &str {
        T::TYPE
    }
}

/// The tracking pipeline shared by the event, people and funnel tasks.
#[derive(Clone)]
pub struct TrackingHandler {
    config: Arc<TrackerConfig>,
    codec: PayloadCodec,
    transport: Arc<dyn Transport>,
}

impl TrackingHandler {
    pub fn new(config: Arc<TrackerConfig>, transport: Arc<dyn Transport>) -> Self {
        let codec = PayloadCodec::from_config(&config);
        Self {
            config,
            codec,
            transport,
        }
    }
}

#[async_trait]
impl Handler<TrackEvent> for TrackingHandler {
    async fn handle(&self, task: TrackEvent) -> Result<bool, TrackError> {
        info!(event = %task.event, "recording event");

        let is_test = resolve_test_flag(task.test, self.config.test_only);
        let properties = attach_token(
            task.properties,
            task.token.as_deref(),
            &self.config.api_token,
        );
        let payload = self
            .codec
            .build_event_params(&task.event, &properties, is_test)?;

        Ok(self
            .transport
            .send(&payload, &self.config.tracking_endpoint)
            .await?)
    }
}

#[async_trait]
impl Handler<TrackPeople> for TrackingHandler {
    async fn handle(&self, task: TrackPeople) -> Result<bool, TrackError> {
        info!(distinct_id = %task.distinct_id, "recording people datapoint");

        let is_test = resolve_test_flag(task.test, self.config.test_only);
        let token = task.token.as_deref().unwrap_or(&self.config.api_token);
        let payload = self.codec.build_people_params(
            &task.distinct_id,
            token,
            task.set.as_ref(),
            task.increment.as_ref(),
            is_test,
        )?;

        Ok(self
            .transport
            .send(&payload, &self.config.people_endpoint)
            .await?)
    }
}

#[async_trait]
impl Handler<TrackFunnel> for TrackingHandler {
    async fn handle(&self, task: TrackFunnel) -> Result<bool, TrackError> {
        info!(funnel = %task.funnel, step = %task.step, "recording funnel");

        let properties = attach_token(
            Some(task.properties),
            task.token.as_deref(),
            &self.config.api_token,
        );
        let is_test = resolve_test_flag(task.test, self.config.test_only);
        let properties = apply_funnel_fields(properties, &task.funnel, &task.step, &task.goal)?;
        let payload = self.codec.build_event_params(
            &self.config.funnel_event_id,
            &properties,
            is_test,
        )?;

        Ok(self
            .transport
            .send(&payload, &self.config.tracking_endpoint)
            .await?)
    }
}
