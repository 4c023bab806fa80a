//! Task trait and the three tracking tasks.
//!
//! A task is the serializable description of one tracking call; its `TYPE`
//! ties it to the handler that executes it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::Properties;

/// Task ties a payload type to a stable task_type name.
///
/// # Naming
/// `{namespace}.tasks.{Tracker}` keeps names stable across refactors of the
/// Rust types, since queued payloads outlive a deploy.
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}

/// Record a generic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    /// Overrides the configured API token (a token inside `properties` still wins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Overrides the configured test-mode default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<bool>,
}

impl TrackEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            properties: None,
            token: None,
            test: None,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }
}

impl Task for TrackEvent {
    const TYPE: &'static str = "tally.tasks.EventTracker";
}

/// Update a user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPeople {
    pub distinct_id: String,
    /// Profile fields to overwrite (`$set`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Properties>,
    /// Numeric fields to add to (`$add`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<bool>,
}

impl TrackPeople {
    pub fn new(distinct_id: impl Into<String>) -> Self {
        Self {
            distinct_id: distinct_id.into(),
            set: None,
            increment: None,
            token: None,
            test: None,
        }
    }

    pub fn with_set(mut self, set: Properties) -> Self {
        self.set = Some(set);
        self
    }

    pub fn with_increment(mut self, increment: Properties) -> Self {
        self.increment = Some(increment);
        self
    }
}

impl Task for TrackPeople {
    const TYPE: &'static str = "tally.tasks.PeopleTracker";
}

/// Record one step of a funnel. `properties` must contain `distinct_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFunnel {
    pub funnel: String,
    pub step: String,
    pub goal: String,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<bool>,
}

impl TrackFunnel {
    pub fn new(
        funnel: impl Into<String>,
        step: impl Into<String>,
        goal: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            funnel: funnel.into(),
            step: step.into(),
            goal: goal.into(),
            properties,
            token: None,
            test: None,
        }
    }
}

impl Task for TrackFunnel {
    const TYPE: &'static str = "tally.tasks.FunnelEventTracker";
}
