//! # Intercom Messages
//!
//! The envelope exchanged over every port. The `type` field is the
//! discriminant; `reqId` is present on requests and their replies only.
//!
//! ```text
//! {"type": "INTERCOM_REQUEST",      "reqId": 1, "data": ...}
//! {"type": "INTERCOM_RESPONSE",     "reqId": 1, "data": ...}
//! {"type": "INTERCOM_ERROR",        "reqId": 1, "data": "description"}
//! {"type": "INTERCOM_SUBSCRIPTION",             "data": ...}
//! ```

use super::ids::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Description sent in an error reply when the failure carries no text.
pub const DEFAULT_ERROR_MESSAGE: &str = "Unexpected error occurred";

/// Discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Correlated call from the remote context.
    #[serde(rename = "INTERCOM_REQUEST")]
    Request,
    /// Successful reply to a request.
    #[serde(rename = "INTERCOM_RESPONSE")]
    Response,
    /// Failed reply to a request.
    #[serde(rename = "INTERCOM_ERROR")]
    Error,
    /// Uncorrelated broadcast notification.
    #[serde(rename = "INTERCOM_SUBSCRIPTION")]
    Subscription,
}

impl MessageType {
    /// Wire representation of the discriminant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "INTERCOM_REQUEST",
            Self::Response => "INTERCOM_RESPONSE",
            Self::Error => "INTERCOM_ERROR",
            Self::Subscription => "INTERCOM_SUBSCRIPTION",
        }
    }

    /// Parse a wire discriminant. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INTERCOM_REQUEST" => Some(Self::Request),
            "INTERCOM_RESPONSE" => Some(Self::Response),
            "INTERCOM_ERROR" => Some(Self::Error),
            "INTERCOM_SUBSCRIPTION" => Some(Self::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded intercom envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// `{type: Request, reqId, data}`
    #[serde(rename = "INTERCOM_REQUEST")]
    Request {
        #[serde(rename = "reqId")]
        req_id: RequestId,
        #[serde(default)]
        data: Value,
    },

    /// `{type: Response, reqId, data}`
    #[serde(rename = "INTERCOM_RESPONSE")]
    Response {
        #[serde(rename = "reqId")]
        req_id: RequestId,
        #[serde(default)]
        data: Value,
    },

    /// `{type: Error, reqId, data: string}`
    #[serde(rename = "INTERCOM_ERROR")]
    Error {
        #[serde(rename = "reqId")]
        req_id: RequestId,
        data: String,
    },

    /// `{type: Subscription, data}`
    #[serde(rename = "INTERCOM_SUBSCRIPTION")]
    Subscription {
        #[serde(default)]
        data: Value,
    },
}

impl Message {
    /// Build a request envelope.
    pub fn request(req_id: impl Into<RequestId>, data: Value) -> Self {
        Self::Request {
            req_id: req_id.into(),
            data,
        }
    }

    /// Build a successful reply.
    pub fn response(req_id: RequestId, data: Value) -> Self {
        Self::Response { req_id, data }
    }

    /// Build a failed reply.
    pub fn error(req_id: RequestId, description: impl Into<String>) -> Self {
        Self::Error {
            req_id,
            data: description.into(),
        }
    }

    /// Build a broadcast notification.
    pub fn subscription(data: Value) -> Self {
        Self::Subscription { data }
    }

    /// Discriminant of this envelope.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Request { .. } => MessageType::Request,
            Self::Response { .. } => MessageType::Response,
            Self::Error { .. } => MessageType::Error,
            Self::Subscription { .. } => MessageType::Subscription,
        }
    }

    /// Correlation token, absent on subscriptions.
    pub fn req_id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { req_id, .. }
            | Self::Response { req_id, .. }
            | Self::Error { req_id, .. } => Some(req_id),
            Self::Subscription { .. } => None,
        }
    }

    /// Classify a raw inbound value.
    ///
    /// Returns `None` when the `type` discriminant is missing or unknown, and
    /// when a known discriminant carries a body that does not fit it. Such
    /// messages are ignored by the broker rather than reported.
    pub fn decode(raw: &Value) -> Option<Self> {
        let discriminant = raw.get("type").and_then(Value::as_str)?;
        MessageType::parse(discriminant)?;
        Self::deserialize(raw).ok()
    }

    /// Encode into the transport's value representation.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
