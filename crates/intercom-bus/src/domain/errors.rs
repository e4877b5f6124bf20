//! Intercom error types.

use super::config::ConfigError;
use super::ids::PortId;
use super::message::DEFAULT_ERROR_MESSAGE;
use thiserror::Error;

/// Failure of a request handler.
///
/// Recovered by the broker: it becomes an error reply on the originating
/// port and is never propagated further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerFailure {
    /// Failure with a human-readable message.
    #[error("{0}")]
    Described(String),

    /// Failure without any message text.
    #[error("{}", DEFAULT_ERROR_MESSAGE)]
    Undescribed,
}

impl HandlerFailure {
    /// Failure carrying `message`. An empty message counts as undescribed.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            Self::Undescribed
        } else {
            Self::Described(message)
        }
    }

    /// Failure without message text.
    pub fn undescribed() -> Self {
        Self::Undescribed
    }

    /// Text sent to the remote endpoint in the error reply.
    pub fn description(&self) -> &str {
        match self {
            Self::Described(message) => message,
            Self::Undescribed => DEFAULT_ERROR_MESSAGE,
        }
    }
}

impl From<anyhow::Error> for HandlerFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<String> for HandlerFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors from sending on a port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The remote end has disconnected.
    #[error("Port {0} is closed")]
    Closed(PortId),

    /// The message could not be encoded for the transport.
    #[error("Failed to encode message for {port}: {reason}")]
    Encode { port: PortId, reason: String },
}

/// Crate-level error for fallible construction and transport plumbing.
#[derive(Debug, Error)]
pub enum IntercomError {
    /// No tokio runtime is available to run request handlers.
    #[error("No tokio runtime available; create the broker inside a runtime")]
    NoRuntime,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A port was used after it closed.
    #[error("Port {0} is closed")]
    PortClosed(PortId),

    /// The transport event channel failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<PortError> for IntercomError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Closed(port) => Self::PortClosed(port),
            PortError::Encode { .. } => Self::Transport(err.to_string()),
        }
    }
}

/// Errors seen by an [`IntercomClient`](crate::adapters::IntercomClient) caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No reply arrived within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The broker answered with an error reply.
    #[error("{0}")]
    Remote(String),

    /// The port closed before a reply arrived.
    #[error("Port disconnected")]
    Disconnected,
}
