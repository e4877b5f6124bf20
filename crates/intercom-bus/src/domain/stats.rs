//! Broker counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one broker.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Requests handed to a request handler.
    pub requests_received: AtomicU64,
    /// Response replies delivered.
    pub responses_sent: AtomicU64,
    /// Error replies delivered.
    pub errors_sent: AtomicU64,
    /// Replies dropped because the origin port had closed.
    pub replies_dropped: AtomicU64,
    /// `broadcast` calls.
    pub broadcasts: AtomicU64,
    /// Subscription messages delivered across all broadcasts.
    pub broadcast_deliveries: AtomicU64,
    /// Inbound messages without a recognized discriminant.
    pub messages_ignored: AtomicU64,
}

impl BrokerStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> BrokerStatsSnapshot {
        BrokerStatsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            errors_sent: self.errors_sent.load(Ordering::Relaxed),
            replies_dropped: self.replies_dropped.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            broadcast_deliveries: self.broadcast_deliveries.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`BrokerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStatsSnapshot {
    pub requests_received: u64,
    pub responses_sent: u64,
    pub errors_sent: u64,
    pub replies_dropped: u64,
    pub broadcasts: u64,
    pub broadcast_deliveries: u64,
    pub messages_ignored: u64,
}

impl BrokerStatsSnapshot {
    /// Replies that reached their port.
    pub fn replies_sent(&self) -> u64 {
        self.responses_sent + self.errors_sent
    }
}
