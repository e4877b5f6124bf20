//! In-memory transport over tokio channels.
//!
//! Every connection is a pair: a [`ChannelPort`] handed to the broker and a
//! [`RemoteEndpoint`] kept by the other execution context. All lifecycle and
//! inbound traffic flows through the transport's single event channel, so
//! the events of one port reach the broker in the order they were produced.
//!
//! ```text
//!  RemoteEndpoint ──post──► events (mpsc, bounded) ──► IntercomBroker::serve
//!        ▲                                                    │
//!        └──────────── outbound (mpsc, unbounded) ◄── ChannelPort::send
//! ```

use crate::domain::{BrokerConfig, IntercomError, Message, PortError, PortId};
use crate::ports::{Port, TransportEvent};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Factory for in-memory connections feeding one broker.
#[derive(Clone)]
pub struct ChannelTransport {
    events: mpsc::Sender<TransportEvent>,
}

impl ChannelTransport {
    /// Create a transport and the event stream to pass to
    /// [`IntercomBroker::serve`](crate::broker::IntercomBroker::serve).
    ///
    /// The stream ends once the transport and every endpoint are dropped.
    pub fn new(config: &BrokerConfig) -> (Self, ReceiverStream<TransportEvent>) {
        let (events, rx) = mpsc::channel(config.event_buffer.max(1));
        (Self { events }, ReceiverStream::new(rx))
    }

    /// Open a new connection and announce it to the broker.
    ///
    /// # Errors
    /// - `IntercomError::Transport`: the broker is no longer consuming events
    pub async fn connect(&self) -> Result<RemoteEndpoint, IntercomError> {
        let (outbound, inbound) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let port = Arc::new(ChannelPort {
            id: PortId::next(),
            outbound: Mutex::new(Some(outbound)),
            connected: Arc::clone(&connected),
        });
        let port_id = port.id;

        self.events
            .send(TransportEvent::Connected(port))
            .await
            .map_err(|_| IntercomError::Transport("broker stopped".into()))?;
        debug!(port_id = %port_id, "Channel port connected");

        Ok(RemoteEndpoint {
            sender: EndpointSender {
                port_id,
                events: self.events.clone(),
                connected,
            },
            inbound,
        })
    }
}

/// Broker-side end of an in-memory connection.
pub struct ChannelPort {
    id: PortId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    connected: Arc<AtomicBool>,
}

impl Port for ChannelPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn send(&self, message: &Message) -> Result<(), PortError> {
        if !self.is_connected() {
            return Err(PortError::Closed(self.id));
        }
        let payload = message.to_value().map_err(|e| PortError::Encode {
            port: self.id,
            reason: e.to_string(),
        })?;

        let outbound = self.outbound.lock();
        let sender = outbound.as_ref().ok_or(PortError::Closed(self.id))?;
        sender.send(payload).map_err(|_| PortError::Closed(self.id))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.outbound.lock().take();
    }
}

/// Posting half of a [`RemoteEndpoint`].
///
/// Dropping it disconnects the port if that has not happened yet.
pub struct EndpointSender {
    port_id: PortId,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

impl EndpointSender {
    /// Identity of the broker-side port.
    pub fn port_id(&self) -> PortId {
        self.port_id
    }

    /// Whether neither side has closed the connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Post a raw message to the broker.
    ///
    /// # Errors
    /// - `IntercomError::PortClosed`: the connection was closed
    /// - `IntercomError::Transport`: the broker is no longer consuming events
    pub async fn post(&self, payload: Value) -> Result<(), IntercomError> {
        if !self.is_connected() {
            return Err(IntercomError::PortClosed(self.port_id));
        }
        self.events
            .send(TransportEvent::Message {
                port: self.port_id,
                payload,
            })
            .await
            .map_err(|_| IntercomError::Transport("broker stopped".into()))
    }

    /// Encode and post a message envelope.
    pub async fn post_message(&self, message: &Message) -> Result<(), IntercomError> {
        let payload = message
            .to_value()
            .map_err(|e| IntercomError::Transport(e.to_string()))?;
        self.post(payload).await
    }

    /// Close the connection and notify the broker. Idempotent.
    pub async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            let _ = self
                .events
                .send(TransportEvent::Disconnected(self.port_id))
                .await;
            debug!(port_id = %self.port_id, "Channel port disconnected");
        }
    }
}

impl Drop for EndpointSender {
    fn drop(&mut self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        match self
            .events
            .try_send(TransportEvent::Disconnected(self.port_id))
        {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => match Handle::try_current() {
                // Queue behind the backlog so the port still leaves the registry.
                Ok(runtime) => {
                    let events = self.events.clone();
                    runtime.spawn(async move {
                        let _ = events.send(event).await;
                    });
                }
                Err(_) => {
                    warn!(
                        port_id = %self.port_id,
                        "Event channel full outside a runtime, disconnect lost"
                    );
                }
            },
            // The broker stopped serving; nothing left to tell.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Remote-context end of an in-memory connection.
pub struct RemoteEndpoint {
    sender: EndpointSender,
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl RemoteEndpoint {
    /// Identity of the broker-side port.
    pub fn port_id(&self) -> PortId {
        self.sender.port_id()
    }

    /// Whether neither side has closed the connection.
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Post a raw message to the broker.
    pub async fn post(&self, payload: Value) -> Result<(), IntercomError> {
        self.sender.post(payload).await
    }

    /// Receive the next message the broker sent to this endpoint.
    ///
    /// Returns `None` once the broker side has closed the port.
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbound.recv().await
    }

    /// Receive a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.inbound.try_recv().ok()
    }

    /// Close the connection and notify the broker.
    pub async fn disconnect(&self) {
        self.sender.disconnect().await
    }

    /// Split into the posting half and the inbound receiver.
    pub fn split(self) -> (EndpointSender, mpsc::UnboundedReceiver<Value>) {
        (self.sender, self.inbound)
    }
}
