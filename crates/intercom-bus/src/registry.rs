//! # Connection Registry
//!
//! Tracks open ports and registered listeners and keeps their wiring in
//! lock-step: every open port has exactly the registered listener set
//! attached, no more and no less.
//!
//! ```text
//!            add_listener / remove_listener
//!                        │
//!   on_port_opened ──►┌──┴───────────────┐◄── on_port_closed
//!                     │  ports × listeners│
//!                     └──┬───────────────┘
//!                        │ dispatch(port, message)
//!                        ▼
//!              listeners attached to port
//! ```
//!
//! All four mutations run under one mutex, so no caller can observe an open
//! port that is missing a registered listener. Listener callbacks are invoked
//! after the lock is released and may call back into the registry.

use crate::domain::{ListenerId, Message, PortId};
use crate::ports::Port;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use intercom_telemetry::log_port_event;
use tracing::{debug, info};

const COMPONENT: &str = "registry";

/// Dispatch callback attached to ports: `(message, origin_port)`.
pub type Listener = Arc<dyn Fn(&Message, &Arc<dyn Port>) + Send + Sync>;

/// One open port and the listeners attached to it.
struct PortEntry {
    port: Arc<dyn Port>,
    attached: Vec<ListenerId>,
}

#[derive(Default)]
struct RegistryState {
    ports: HashMap<PortId, PortEntry>,
    /// Registration order is dispatch order.
    listeners: Vec<(ListenerId, Listener)>,
}

impl RegistryState {
    fn listener(&self, id: ListenerId) -> Option<&Listener> {
        self.listeners
            .iter()
            .find(|(lid, _)| *lid == id)
            .map(|(_, listener)| listener)
    }

    fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(lid, _)| *lid == id)
    }
}

/// Open ports, registered listeners and their cross-product wiring.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach every registered listener to `port` and add it to the open set.
    ///
    /// Returns `false` if a port with the same identity is already open.
    pub fn on_port_opened(&self, port: Arc<dyn Port>) -> bool {
        let port_id = port.id();
        let mut state = self.state.lock();
        if state.ports.contains_key(&port_id) {
            debug!(port_id = %port_id, "Port already open");
            return false;
        }

        let attached: Vec<ListenerId> = state.listeners.iter().map(|(id, _)| *id).collect();
        let listeners = attached.len();
        state.ports.insert(port_id, PortEntry { port, attached });

        log_port_event!(
            info,
            COMPONENT,
            "Port opened",
            port_id,
            listeners = listeners,
            open_ports = state.ports.len()
        );
        true
    }

    /// Detach every listener from `port_id` and remove it from the open set.
    ///
    /// Idempotent: returns `false` if the port was not open.
    pub fn on_port_closed(&self, port_id: PortId) -> bool {
        let mut state = self.state.lock();
        let Some(mut entry) = state.ports.remove(&port_id) else {
            debug!(port_id = %port_id, "Port already closed");
            return false;
        };
        entry.attached.clear();

        log_port_event!(
            info,
            COMPONENT,
            "Port closed",
            port_id,
            open_ports = state.ports.len()
        );
        true
    }

    /// Attach `listener` to every open port and add it to the listener set.
    ///
    /// Returns `false` (and changes nothing) if `id` is already registered.
    pub fn add_listener(&self, id: ListenerId, listener: Listener) -> bool {
        let mut state = self.state.lock();
        if state.has_listener(id) {
            debug!(listener_id = %id, "Listener already registered");
            return false;
        }

        for entry in state.ports.values_mut() {
            entry.attached.push(id);
        }
        state.listeners.push((id, listener));

        debug!(
            listener_id = %id,
            listeners = state.listeners.len(),
            "Listener added"
        );
        true
    }

    /// Detach `id` from every open port and remove it from the listener set.
    ///
    /// Returns `false` if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        if !state.has_listener(id) {
            return false;
        }

        for entry in state.ports.values_mut() {
            entry.attached.retain(|lid| *lid != id);
        }
        state.listeners.retain(|(lid, _)| *lid != id);

        debug!(
            listener_id = %id,
            listeners = state.listeners.len(),
            "Listener removed"
        );
        true
    }

    /// Deliver an inbound message to the listeners attached to `port_id`.
    ///
    /// Returns the number of listeners invoked. A port that is not open has
    /// no listeners, so messages still queued for a closed port go nowhere.
    pub fn dispatch(&self, port_id: PortId, message: &Message) -> usize {
        let (port, listeners) = {
            let state = self.state.lock();
            let Some(entry) = state.ports.get(&port_id) else {
                debug!(port_id = %port_id, "Dropping message for closed port");
                return 0;
            };
            let listeners: Vec<Listener> = entry
                .attached
                .iter()
                .filter_map(|id| state.listener(*id).cloned())
                .collect();
            (Arc::clone(&entry.port), listeners)
        };

        for listener in &listeners {
            listener(message, &port);
        }
        listeners.len()
    }

    /// Snapshot of the open ports.
    pub fn open_ports(&self) -> Vec<Arc<dyn Port>> {
        self.state
            .lock()
            .ports
            .values()
            .map(|entry| Arc::clone(&entry.port))
            .collect()
    }

    /// Whether `port_id` is open.
    pub fn is_open(&self, port_id: PortId) -> bool {
        self.state.lock().ports.contains_key(&port_id)
    }

    /// Number of open ports.
    pub fn port_count(&self) -> usize {
        self.state.lock().ports.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Registered listener identities, in registration order.
    pub fn registered_listeners(&self) -> Vec<ListenerId> {
        self.state
            .lock()
            .listeners
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    /// Listener identities attached to `port_id`, or `None` if it is not open.
    pub fn attached_listeners(&self, port_id: PortId) -> Option<Vec<ListenerId>> {
        self.state
            .lock()
            .ports
            .get(&port_id)
            .map(|entry| entry.attached.clone())
    }

    /// Remove every open port, detaching all listeners, and return them.
    pub fn drain_ports(&self) -> Vec<Arc<dyn Port>> {
        let mut state = self.state.lock();
        let drained: Vec<Arc<dyn Port>> = state
            .ports
            .drain()
            .map(|(_, entry)| entry.port)
            .collect();
        if !drained.is_empty() {
            info!(ports = drained.len(), "Closed all ports");
        }
        drained
    }
}
