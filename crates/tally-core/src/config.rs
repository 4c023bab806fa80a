//! Tracker configuration.
//!
//! Loaded once at startup and shared read-only (`Arc<TrackerConfig>`) by every
//! handler and worker.

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::queue::RetryPolicy;

pub const DEFAULT_API_HOST: &str = "api.mixpanel.com";
pub const DEFAULT_TRACKING_ENDPOINT: &str = "/track/";
pub const DEFAULT_PEOPLE_ENDPOINT: &str = "/engage/";
pub const DEFAULT_DATA_VARIABLE: &str = "data";
pub const DEFAULT_FUNNEL_EVENT_ID: &str = "mp_funnel";
pub const DEFAULT_RESERVED_PEOPLE_PROPERTIES: &[&str] = &[
    "email",
    "phone",
    "first_name",
    "last_name",
    "name",
    "created",
    "username",
    "last_seen",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got `{value}`")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Everything the tracking pipeline reads from settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Default API token, used when neither the properties nor the call carry one.
    pub api_token: String,

    /// `host` or `host:port` of the tracking API (plain HTTP).
    pub api_host: String,

    /// Upper bound for connect + request + response of one attempt.
    pub api_timeout: Duration,

    pub tracking_endpoint: String,
    pub people_endpoint: String,

    /// Default for the per-call `test` flag.
    pub test_only: bool,

    pub max_retries: u32,
    pub retry_delay: Duration,

    /// Query parameter carrying the base64 payload.
    pub data_variable: String,

    /// Profile properties sent with a `$` prefix.
    pub reserved_people_properties: BTreeSet<String>,

    /// Event name used for funnel submissions.
    pub funnel_event_id: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_host: DEFAULT_API_HOST.to_string(),
            api_timeout: Duration::from_secs(5),
            tracking_endpoint: DEFAULT_TRACKING_ENDPOINT.to_string(),
            people_endpoint: DEFAULT_PEOPLE_ENDPOINT.to_string(),
            test_only: false,
            max_retries: 5,
            retry_delay: Duration::from_secs(300),
            data_variable: DEFAULT_DATA_VARIABLE.to_string(),
            reserved_people_properties: DEFAULT_RESERVED_PEOPLE_PROPERTIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            funnel_event_id: DEFAULT_FUNNEL_EVENT_ID.to_string(),
        }
    }
}

impl TrackerConfig {
    /// Defaults overlaid with `TALLY_*` environment variables.
    ///
    /// Environment variables:
    /// - `TALLY_API_TOKEN`
    /// - `TALLY_API_HOST` (default: api.mixpanel.com)
    /// - `TALLY_API_TIMEOUT_SECS` (default: 5)
    /// - `TALLY_TRACKING_ENDPOINT` (default: /track/)
    /// - `TALLY_PEOPLE_ENDPOINT` (default: /engage/)
    /// - `TALLY_TEST_ONLY` (default: false)
    /// - `TALLY_MAX_RETRIES` (default: 5)
    /// - `TALLY_RETRY_DELAY_SECS` (default: 300)
    /// - `TALLY_DATA_VARIABLE` (default: data)
    /// - `TALLY_RESERVED_PEOPLE_PROPERTIES` (comma separated)
    /// - `TALLY_FUNNEL_EVENT_ID` (default: mp_funnel)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup, so
    /// tests do not have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("TALLY_API_TOKEN") {
            config.api_token = v;
        }
        if let Some(v) = lookup("TALLY_API_HOST") {
            config.api_host = v;
        }
        if let Some(v) = lookup("TALLY_API_TIMEOUT_SECS") {
            config.api_timeout = parse_secs("TALLY_API_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("TALLY_TRACKING_ENDPOINT") {
            config.tracking_endpoint = v;
        }
        if let Some(v) = lookup("TALLY_PEOPLE_ENDPOINT") {
            config.people_endpoint = v;
        }
        if let Some(v) = lookup("TALLY_TEST_ONLY") {
            config.test_only = parse_bool("TALLY_TEST_ONLY", &v)?;
        }
        if let Some(v) = lookup("TALLY_MAX_RETRIES") {
            config.max_retries = v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "TALLY_MAX_RETRIES",
                expected: "a non-negative integer",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("TALLY_RETRY_DELAY_SECS") {
            config.retry_delay = parse_secs("TALLY_RETRY_DELAY_SECS", &v)?;
        }
        if let Some(v) = lookup("TALLY_DATA_VARIABLE") {
            config.data_variable = v;
        }
        if let Some(v) = lookup("TALLY_RESERVED_PEOPLE_PROPERTIES") {
            config.reserved_people_properties = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("TALLY_FUNNEL_EVENT_ID") {
            config.funnel_event_id = v;
        }

        Ok(config)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = token.into();
        self
    }

    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into();
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    pub fn with_test_only(mut self, test_only: bool) -> Self {
        self.test_only = test_only;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_delay, self.max_retries)
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::Invalid {
            var,
            expected: "a non-negative number of seconds",
            value: value.to_string(),
        })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}
