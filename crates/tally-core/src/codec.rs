//! PayloadCodec - request encoding for the tracking API.
//!
//! Wire format: `{data_variable}=base64(JSON(params))&test={0|1}`, form
//! url-encoded. Encoding is deterministic for a fixed key order and never
//! performs I/O.

use std::collections::BTreeSet;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::config::TrackerConfig;
use crate::domain::{Properties, TrackError, rewrite_reserved_people_keys};

/// Query string ready to be appended to an endpoint path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct EventParams<'a> {
    event: &'a str,
    properties: &'a Properties,
}

#[derive(Serialize)]
struct PeopleParams<'a> {
    #[serde(rename = "$distinct_id")]
    distinct_id: &'a str,
    #[serde(rename = "$token")]
    token: &'a str,
    #[serde(rename = "$set", skip_serializing_if = "Option::is_none")]
    set: Option<Properties>,
    #[serde(rename = "$add", skip_serializing_if = "Option::is_none")]
    add: Option<&'a Properties>,
}

/// Encoder holding the two settings that shape the wire format.
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    data_variable: String,
    reserved_people_properties: BTreeSet<String>,
}

impl PayloadCodec {
    pub fn new(
        data_variable: impl Into<String>,
        reserved_people_properties: BTreeSet<String>,
    ) -> Self {
        Self {
            data_variable: data_variable.into(),
            reserved_people_properties,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            config.data_variable.clone(),
            config.reserved_people_properties.clone(),
        )
    }

    /// Encode `{event, properties}` for the event endpoint.
    pub fn build_event_params(
        &self,
        event: &str,
        properties: &Properties,
        is_test: u8,
    ) -> Result<EncodedPayload, TrackError> {
        self.encode(&EventParams { event, properties }, is_test)
    }

    /// Encode a profile update for the people endpoint.
    ///
    /// Reserved names in `set` are sent `$`-prefixed; `increment` becomes `$add`.
    pub fn build_people_params(
        &self,
        distinct_id: &str,
        token: &str,
        set: Option<&Properties>,
        increment: Option<&Properties>,
        is_test: u8,
    ) -> Result<EncodedPayload, TrackError> {
        let set = set.map(|fields| {
            rewrite_reserved_people_keys(fields.clone(), &self.reserved_people_properties)
        });
        let params = PeopleParams {
            distinct_id,
            token,
            set,
            add: increment,
        };
        self.encode(&params, is_test)
    }

    fn encode<T: Serialize>(&self, params: &T, is_test: u8) -> Result<EncodedPayload, TrackError> {
        let json = serde_json::to_vec(params).map_err(TrackError::Encoding)?;
        let data = STANDARD.encode(json);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.data_variable, &data)
            .append_pair("test", &is_test.to_string())
            .finish();
        Ok(EncodedPayload(query))
    }
}
