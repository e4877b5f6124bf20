//! Outbound (Driven) ports: the transport collaborator.
//!
//! The broker never creates a port. A transport accepts connections, wraps
//! each one in a [`Port`] and reports its lifecycle as [`TransportEvent`]s.

use crate::domain::{Message, PortId, PortError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One duplex connection to a remote execution context.
pub trait Port: Send + Sync {
    /// Identity of this port.
    fn id(&self) -> PortId;

    /// Post a message to the remote end.
    ///
    /// # Errors
    /// - `PortError::Closed`: the remote end has gone away
    fn send(&self, message: &Message) -> Result<(), PortError>;

    /// Whether the remote end is still reachable.
    fn is_connected(&self) -> bool;

    /// Close the connection from the broker side.
    fn close(&self) {}
}

impl fmt::Debug for dyn Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Lifecycle and traffic events produced by a transport.
///
/// A transport must emit all events of one port in order, on one channel:
/// `Connected`, then any number of `Message`, then `Disconnected`.
#[derive(Clone)]
pub enum TransportEvent {
    /// A new port connected.
    Connected(Arc<dyn Port>),

    /// A raw inbound message arrived on a port.
    Message {
        /// Origin port.
        port: PortId,
        /// Undecoded payload as framed by the transport.
        payload: Value,
    },

    /// A port disconnected.
    Disconnected(PortId),
}

impl TransportEvent {
    /// Port this event concerns.
    pub fn port_id(&self) -> PortId {
        match self {
            Self::Connected(port) => port.id(),
            Self::Message { port, .. } => *port,
            Self::Disconnected(port) => *port,
        }
    }
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(port) => f.debug_tuple("Connected").field(&port.id()).finish(),
            Self::Message { port, payload } => f
                .debug_struct("Message")
                .field("port", port)
                .field("payload", payload)
                .finish(),
            Self::Disconnected(port) => f.debug_tuple("Disconnected").field(port).finish(),
        }
    }
}

/// Recording port for tests: keeps every sent message.
#[cfg(test)]
pub struct MockPort {
    id: PortId,
    sent: parking_lot::Mutex<Vec<Message>>,
    connected: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: PortId::next(),
            sent: parking_lot::Mutex::new(Vec::new()),
            connected: std::sync::atomic::AtomicBool::new(true),
        })
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    pub fn disconnect(&self) {
        self.connected
            .store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Port for MockPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn send(&self, message: &Message) -> Result<(), PortError> {
        if !self.is_connected() {
            return Err(PortError::Closed(self.id));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn close(&self) {
        self.disconnect();
    }
}
