//! # Intercom Telemetry
//!
//! Structured logging for intercom brokers and clients.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use intercom_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env())
//!         .expect("Failed to init telemetry");
//!     // broker runs here
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `INTERCOM_SERVICE_NAME` | `intercom` | Service name in logs |
//! | `INTERCOM_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `INTERCOM_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `INTERCOM_JSON_LOGS` | `false` | JSON formatted logs |

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Global subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install the global log subscriber.
///
/// Returns a guard to hold for the lifetime of the application. A second
/// call in the same process fails with `TelemetryError::AlreadyInitialized`
/// and leaves the first subscriber in place.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    tracing_setup::init_tracing(config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    /// Service name the subscriber was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
