//! Broker configuration with validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default capacity of the transport event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Default capacity of a client's subscription channel.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 256;

/// Default client request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the broker and the bundled adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Capacity of the transport event channel feeding `serve`.
    pub event_buffer: usize,
    /// Capacity of each client's subscription channel.
    pub subscription_buffer: usize,
    /// How long a client waits for a reply.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Close every open port once the transport event stream ends.
    pub close_ports_on_shutdown: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            close_ports_on_shutdown: true,
        }
    }
}

impl BrokerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `INTERCOM_EVENT_BUFFER`: transport event channel capacity (default: 1024)
    /// - `INTERCOM_SUBSCRIPTION_BUFFER`: client subscription capacity (default: 256)
    /// - `INTERCOM_REQUEST_TIMEOUT_MS`: client request timeout (default: 30000)
    /// - `INTERCOM_CLOSE_PORTS_ON_SHUTDOWN`: close ports when serving ends (default: true)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            event_buffer: env::var("INTERCOM_EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.event_buffer),

            subscription_buffer: env::var("INTERCOM_SUBSCRIPTION_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.subscription_buffer),

            request_timeout: env::var("INTERCOM_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),

            close_ports_on_shutdown: env::var("INTERCOM_CLOSE_PORTS_ON_SHUTDOWN")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.close_ports_on_shutdown),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidLimit("event_buffer cannot be 0".into()));
        }

        if self.subscription_buffer == 0 {
            return Err(ConfigError::InvalidLimit("subscription_buffer cannot be 0".into()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("request_timeout cannot be 0".into()));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Duration serialization as `"30s"`, `"500ms"` or `"2m"`.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m": both are suffixes of it
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            let mins = mins.trim().parse::<u64>().map_err(|_| "invalid minutes")?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or("minutes out of range")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
