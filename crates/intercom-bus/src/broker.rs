//! # Intercom Broker
//!
//! Drives a [`ConnectionRegistry`] from transport events and serves the two
//! messaging patterns on top of it:
//!
//! - **Request/response**: an installed [`RequestHandler`] answers every
//!   `INTERCOM_REQUEST` on the port it arrived on, correlated by `reqId`.
//! - **Broadcast**: [`IntercomBroker::broadcast`] posts one
//!   `INTERCOM_SUBSCRIPTION` to every port open at call time.
//!
//! ## Event Flow
//!
//! ```text
//! transport ──TransportEvent──► serve ──► handle_event
//!                                            │
//!               Connected ──► registry.on_port_opened
//!               Message   ──► Message::decode ──► registry.dispatch
//!               Disconnected ─► registry.on_port_closed
//! ```
//!
//! Handlers run as tokio tasks on the runtime captured at construction, so
//! a slow handler never stalls the event loop. Handler failures and panics
//! turn into error replies; a reply to a port that has since closed is
//! dropped with a warning.

use crate::domain::{
    BrokerConfig, BrokerStats, BrokerStatsSnapshot, HandlerFailure, IntercomError, ListenerId,
    Message, PortError, RequestId,
};
use crate::ports::{IntercomApi, Port, RequestHandler, TransportEvent};
use crate::registry::{ConnectionRegistry, Listener};
use futures::{FutureExt, Stream, StreamExt};
use intercom_telemetry::log_request_event;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "broker";

/// Port broker for one side of an intercom link.
///
/// Cheap to clone; clones share the registry, counters and runtime.
#[derive(Clone)]
pub struct IntercomBroker {
    registry: Arc<ConnectionRegistry>,
    runtime: Handle,
    stats: Arc<BrokerStats>,
    config: BrokerConfig,
}

impl IntercomBroker {
    /// Create a broker bound to the current tokio runtime.
    ///
    /// # Errors
    /// - `IntercomError::Config`: `config` failed validation
    /// - `IntercomError::NoRuntime`: called outside a tokio runtime
    pub fn new(config: BrokerConfig) -> Result<Self, IntercomError> {
        let runtime = Handle::try_current().map_err(|_| IntercomError::NoRuntime)?;
        Self::with_parts(config, Arc::new(ConnectionRegistry::new()), runtime)
    }

    /// Create a broker from an existing registry and runtime handle.
    pub fn with_parts(
        config: BrokerConfig,
        registry: Arc<ConnectionRegistry>,
        runtime: Handle,
    ) -> Result<Self, IntercomError> {
        config.validate()?;
        Ok(Self {
            registry,
            runtime,
            stats: Arc::new(BrokerStats::default()),
            config,
        })
    }

    /// Serve every inbound request, on every current and future port, with
    /// `handler`.
    ///
    /// Dropping the returned registration keeps the handler installed; call
    /// [`HandlerRegistration::unsubscribe`] to remove it.
    pub fn handle_request<H: RequestHandler>(&self, handler: H) -> HandlerRegistration {
        self.install_handler(Arc::new(handler))
    }

    /// Post a Subscription message carrying `data` to every open port.
    ///
    /// Ports opened after this call starts receive nothing from it. Returns
    /// the number of ports that accepted the message.
    pub fn broadcast(&self, data: Value) -> usize {
        let ports = self.registry.open_ports();
        let message = Message::subscription(data);

        let mut delivered = 0usize;
        for port in &ports {
            match port.send(&message) {
                Ok(()) => delivered += 1,
                Err(PortError::Closed(port_id)) => {
                    debug!(port_id = %port_id, "Skipping broadcast to closed port");
                }
                Err(e) => {
                    warn!(port_id = %port.id(), error = %e, "Broadcast send failed");
                }
            }
        }

        BrokerStats::incr(&self.stats.broadcasts);
        BrokerStats::add(&self.stats.broadcast_deliveries, delivered as u64);
        debug!(
            ports = ports.len(),
            delivered = delivered,
            "Broadcast subscription"
        );
        delivered
    }

    /// Apply one transport event to the registry.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(port) => {
                self.registry.on_port_opened(port);
            }
            TransportEvent::Message { port, payload } => match Message::decode(&payload) {
                Some(message) => {
                    self.registry.dispatch(port, &message);
                }
                None => {
                    BrokerStats::incr(&self.stats.messages_ignored);
                    debug!(port_id = %port, "Ignoring message without intercom discriminant");
                }
            },
            TransportEvent::Disconnected(port) => {
                self.registry.on_port_closed(port);
            }
        }
    }

    /// Consume transport events until the stream ends.
    ///
    /// With `close_ports_on_shutdown` set, every port still open when the
    /// stream ends is removed from the registry and closed.
    pub async fn serve<S>(&self, events: S)
    where
        S: Stream<Item = TransportEvent>,
    {
        futures::pin_mut!(events);
        info!(listeners = self.registry.listener_count(), "Intercom broker serving");

        while let Some(event) = events.next().await {
            self.handle_event(event);
        }

        if self.config.close_ports_on_shutdown {
            self.shutdown();
        }
        info!("Intercom broker stopped");
    }

    /// Run [`serve`](Self::serve) as a task on the broker's runtime.
    pub fn spawn<S>(&self, events: S) -> JoinHandle<()>
    where
        S: Stream<Item = TransportEvent> + Send + 'static,
    {
        let broker = self.clone();
        self.runtime.spawn(async move { broker.serve(events).await })
    }

    /// Close and forget every open port.
    pub fn shutdown(&self) -> usize {
        let ports = self.registry.drain_ports();
        for port in &ports {
            port.close();
        }
        ports.len()
    }

    /// Number of ports currently open.
    pub fn port_count(&self) -> usize {
        self.registry.port_count()
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> BrokerStatsSnapshot {
        self.stats.snapshot()
    }

    /// The registry this broker drives.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

impl IntercomApi for IntercomBroker {
    fn install_handler(&self, handler: Arc<dyn RequestHandler>) -> HandlerRegistration {
        let id = ListenerId::next();
        let active = Arc::new(AtomicBool::new(true));

        let listener: Listener = {
            let active = Arc::clone(&active);
            let runtime = self.runtime.clone();
            let stats = Arc::clone(&self.stats);
            Arc::new(move |message: &Message, port: &Arc<dyn Port>| {
                let Message::Request { req_id, data } = message else {
                    return;
                };
                if !active.load(Ordering::Acquire) {
                    return;
                }
                BrokerStats::incr(&stats.requests_received);

                let handler = Arc::clone(&handler);
                let port = Arc::clone(port);
                let stats = Arc::clone(&stats);
                let req_id = req_id.clone();
                let data = data.clone();
                runtime.spawn(async move {
                    let reply = run_handler(handler.as_ref(), req_id, data).await;
                    deliver_reply(port.as_ref(), &reply, &stats);
                });
            })
        };

        self.registry.add_listener(id, listener);
        debug!(listener_id = %id, "Request handler installed");

        HandlerRegistration {
            id,
            active,
            registry: Arc::downgrade(&self.registry),
        }
    }

    fn broadcast(&self, data: Value) -> usize {
        IntercomBroker::broadcast(self, data)
    }

    fn port_count(&self) -> usize {
        IntercomBroker::port_count(self)
    }
}

/// Run `handler` and turn its outcome into the reply envelope.
async fn run_handler(handler: &dyn RequestHandler, req_id: RequestId, data: Value) -> Message {
    let outcome = AssertUnwindSafe(handler.handle(data))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(panic_failure(panic.as_ref())));

    match outcome {
        Ok(result) => Message::response(req_id, result),
        Err(failure) => {
            warn!(req_id = %req_id, error = %failure, "Request handler failed");
            Message::error(req_id, failure.description())
        }
    }
}

fn panic_failure(panic: &(dyn Any + Send)) -> HandlerFailure {
    if let Some(message) = panic.downcast_ref::<&str>() {
        HandlerFailure::new(*message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        HandlerFailure::new(message.as_str())
    } else {
        HandlerFailure::undescribed()
    }
}

/// Post a reply on its origin port. A closed port drops the reply.
fn deliver_reply(port: &dyn Port, reply: &Message, stats: &BrokerStats) {
    let Some(req_id) = reply.req_id() else {
        return;
    };
    match port.send(reply) {
        Ok(()) => {
            match reply {
                Message::Error { .. } => BrokerStats::incr(&stats.errors_sent),
                _ => BrokerStats::incr(&stats.responses_sent),
            }
            log_request_event!(debug, COMPONENT, "Reply sent", port.id(), req_id);
        }
        Err(PortError::Closed(port_id)) => {
            BrokerStats::incr(&stats.replies_dropped);
            log_request_event!(
                warn,
                COMPONENT,
                "Origin port closed, reply dropped",
                port_id,
                req_id
            );
        }
        Err(e) => {
            BrokerStats::incr(&stats.replies_dropped);
            log_request_event!(
                warn,
                COMPONENT,
                "Failed to send reply",
                port.id(),
                req_id,
                error = %e
            );
        }
    }
}

/// Handle to an installed request handler.
///
/// The handler stays installed until [`unsubscribe`](Self::unsubscribe) is
/// called, even if this value is dropped.
#[must_use = "keep the registration to be able to remove the handler"]
#[derive(Debug)]
pub struct HandlerRegistration {
    id: ListenerId,
    active: Arc<AtomicBool>,
    registry: Weak<ConnectionRegistry>,
}

impl HandlerRegistration {
    /// Listener identity of the handler.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the handler from every current and future port.
    ///
    /// Idempotent: returns `false` if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        let removed = self
            .registry
            .upgrade()
            .map(|registry| registry.remove_listener(self.id))
            .unwrap_or(false);
        if was_active {
            debug!(listener_id = %self.id, "Request handler removed");
        }
        was_active && removed
    }

    /// Whether the handler is still installed.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
