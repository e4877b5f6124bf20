//! Property tests over random operation sequences.

pub mod wiring;

use intercom_bus::{Message, Port, PortError, PortId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory port that records what the broker sends it.
pub struct RecordingPort {
    id: PortId,
    sent: Mutex<Vec<Message>>,
    connected: AtomicBool,
}

impl RecordingPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: PortId::next(),
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

impl Port for RecordingPort {
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
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
