//! Property normalization.
//!
//! Pure functions that turn caller input into the canonical properties map
//! sent to the tracking API. Nothing here touches the network.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use super::errors::TrackError;

/// Event / profile properties. Insertion ordered (serde_json `preserve_order`),
/// so encoding the same input twice yields identical bytes.
pub type Properties = serde_json::Map<String, Value>;

/// Key every funnel event must carry.
pub const DISTINCT_ID: &str = "distinct_id";

/// `1` if this request must not be stored remotely, `0` otherwise.
///
/// An explicit flag wins; `None` falls back to the configured default.
pub fn resolve_test_flag(explicit: Option<bool>, test_only_default: bool) -> u8 {
    u8::from(explicit.unwrap_or(test_only_default))
}

/// Ensure `properties` carries a `token`.
///
/// A non-empty token already present in the properties is kept. Otherwise the
/// `token` argument is used, or `default_token` when that is `None`.
pub fn attach_token(
    properties: Option<Properties>,
    token: Option<&str>,
    default_token: &str,
) -> Properties {
    let mut properties = properties.unwrap_or_default();
    let has_token = match properties.get("token") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    if !has_token {
        let token = token.unwrap_or(default_token);
        properties.insert("token".to_string(), Value::String(token.to_string()));
    }
    properties
}

/// Add `funnel`, `step` and `goal` to the properties of a funnel event.
///
/// Fails before anything is sent when `distinct_id` is missing.
pub fn apply_funnel_fields(
    mut properties: Properties,
    funnel: &str,
    step: &str,
    goal: &str,
) -> Result<Properties, TrackError> {
    if !properties.contains_key(DISTINCT_ID) {
        return Err(TrackError::MissingRequiredField { field: DISTINCT_ID });
    }
    properties.insert("funnel".to_string(), Value::from(funnel));
    properties.insert("step".to_string(), Value::from(step));
    properties.insert("goal".to_string(), Value::from(goal));
    Ok(properties)
}

/// Move reserved profile property names to their `$`-prefixed form.
///
/// A reserved value overwrites an explicit `$name` entry if both are given.
pub fn rewrite_reserved_people_keys(
    set_fields: Properties,
    reserved: &BTreeSet<String>,
) -> Properties {
    let mut rewritten = Properties::new();
    let mut moved = Vec::new();
    for (key, value) in set_fields {
        if reserved.contains(&key) {
            moved.push((format!("${key}"), value));
        } else {
            rewritten.insert(key, value);
        }
    }
    rewritten.extend(moved);
    rewritten
}

/// Convert any serializable value into a properties map.
///
/// Fails with [`TrackError::Encoding`] if the value cannot be represented as
/// a JSON object (non-string map keys, a bare scalar, a failing `Serialize`
/// impl).
pub fn to_properties<T: Serialize + ?Sized>(value: &T) -> Result<Properties, TrackError> {
    match serde_json::to_value(value).map_err(TrackError::Encoding)? {
        Value::Object(map) => Ok(map),
        other => Err(TrackError::Encoding(serde::ser::Error::custom(format!(
            "properties must serialize to a JSON object, got {other}"
        )))),
    }
}
