//! Identities for ports, listeners and requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PORT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one open port.
///
/// Allocated by the transport when a connection is accepted. Unique for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u64);

impl PortId {
    /// Allocate the next port identity.
    pub fn next() -> Self {
        Self(NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

/// Identity of a registered listener.
///
/// Listener set semantics are keyed by this value: registering the same
/// `ListenerId` twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate the next listener identity.
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Caller-assigned correlation token of a request.
///
/// Opaque to the broker: any JSON value is accepted on the wire and echoed
/// back unchanged on the reply. The bundled client assigns numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Value);

impl RequestId {
    /// Numeric value, if the token is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.as_u64()
    }

    /// Raw wire value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self(Value::from(value))
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<Value> for RequestId {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
