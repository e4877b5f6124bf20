//! # Intercom Client
//!
//! The remote context's counterpart of the broker. Turns request/response
//! messaging back into plain async calls and exposes broadcasts as a
//! subscription channel.
//!
//! ## Correlation
//!
//! Each request gets the next numeric `reqId` and a pending entry holding a
//! `oneshot` sender. A reader task drains the endpoint's inbound channel and
//! completes the pending entry matching each Response or Error:
//!
//! ```text
//! request(data) ──► pending[reqId] = tx ──► post {INTERCOM_REQUEST, reqId}
//!                                                  │
//! reader task ◄── {INTERCOM_RESPONSE|ERROR, reqId} ┘ ──► pending.remove(reqId).send
//!             ◄── {INTERCOM_SUBSCRIPTION}          ──► subscribers
//! ```
//!
//! Entries are removed on reply, on timeout and, for every entry still
//! waiting, when the broker side closes the port.

use super::channel::{ChannelTransport, EndpointSender, RemoteEndpoint};
use crate::domain::{BrokerConfig, ClientError, IntercomError, Message, PortId, RequestId};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

type PendingMap = DashMap<u64, oneshot::Sender<Result<Value, ClientError>>>;

/// Async request/subscribe API over one connection to a broker.
pub struct IntercomClient {
    sender: EndpointSender,
    pending: Arc<PendingMap>,
    next_req_id: AtomicU64,
    subscriptions: broadcast::Sender<Value>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl IntercomClient {
    /// Open a connection on `transport` and wrap it in a client.
    pub async fn connect(
        transport: &ChannelTransport,
        config: &BrokerConfig,
    ) -> Result<Self, IntercomError> {
        let endpoint = transport.connect().await?;
        Self::new(endpoint, config)
    }

    /// Wrap an existing endpoint. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// - `IntercomError::NoRuntime`: no runtime to run the reader task on
    pub fn new(endpoint: RemoteEndpoint, config: &BrokerConfig) -> Result<Self, IntercomError> {
        let runtime = Handle::try_current().map_err(|_| IntercomError::NoRuntime)?;
        let (sender, inbound) = endpoint.split();
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let (subscriptions, _) = broadcast::channel(config.subscription_buffer.max(1));

        let reader = runtime.spawn(read_replies(
            sender.port_id(),
            inbound,
            Arc::clone(&pending),
            subscriptions.clone(),
        ));

        Ok(Self {
            sender,
            pending,
            next_req_id: AtomicU64::new(1),
            subscriptions,
            request_timeout: config.request_timeout,
            reader,
        })
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    /// - `ClientError::Remote`: the handler failed; carries its description
    /// - `ClientError::Timeout`: no reply within the request timeout
    /// - `ClientError::Disconnected`: the port closed before a reply arrived
    pub async fn request(&self, data: Value) -> Result<Value, ClientError> {
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(req_id, tx);

        if let Err(e) = self
            .sender
            .post_message(&Message::request(req_id, data))
            .await
        {
            self.pending.remove(&req_id);
            debug!(req_id = req_id, error = %e, "Failed to post request");
            return Err(ClientError::Disconnected);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                self.pending.remove(&req_id);
                warn!(
                    req_id = req_id,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Request timed out"
                );
                Err(ClientError::Timeout)
            }
        }
    }

    /// Receive every broadcast payload sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.subscriptions.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a `Stream`.
    pub fn subscription_stream(&self) -> BroadcastStream<Value> {
        BroadcastStream::new(self.subscribe())
    }

    /// Requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Identity of the broker-side port.
    pub fn port_id(&self) -> PortId {
        self.sender.port_id()
    }

    /// Whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Close the connection. Pending requests fail with `Disconnected`.
    pub async fn disconnect(&self) {
        self.sender.disconnect().await;
        fail_pending(&self.pending);
    }
}

impl Drop for IntercomClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_replies(
    port_id: PortId,
    mut inbound: mpsc::UnboundedReceiver<Value>,
    pending: Arc<PendingMap>,
    subscriptions: broadcast::Sender<Value>,
) {
    while let Some(raw) = inbound.recv().await {
        match Message::decode(&raw) {
            Some(Message::Response { req_id, data }) => complete(&pending, &req_id, Ok(data)),
            Some(Message::Error { req_id, data }) => {
                complete(&pending, &req_id, Err(ClientError::Remote(data)))
            }
            Some(Message::Subscription { data }) => {
                // No receivers is fine; broadcasts are fire-and-forget.
                let _ = subscriptions.send(data);
            }
            Some(Message::Request { req_id, .. }) => {
                debug!(port_id = %port_id, req_id = %req_id, "Ignoring request sent to client");
            }
            None => {
                debug!(port_id = %port_id, "Ignoring message without intercom discriminant");
            }
        }
    }

    debug!(port_id = %port_id, pending = pending.len(), "Broker closed port");
    fail_pending(&pending);
}

fn complete(pending: &PendingMap, req_id: &RequestId, reply: Result<Value, ClientError>) {
    let Some(id) = req_id.as_u64() else {
        debug!(req_id = %req_id, "Reply for a request this client did not send");
        return;
    };
    match pending.remove(&id) {
        Some((_, tx)) => {
            let _ = tx.send(reply);
        }
        None => debug!(req_id = id, "Late reply for expired request"),
    }
}

fn fail_pending(pending: &PendingMap) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(ClientError::Disconnected));
        }
    }
}
