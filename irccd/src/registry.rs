//! Transport client registry.
//!
//! Tracks connected control clients (irccdctl connections and any other
//! transport peer) so the dispatcher can broadcast IRC events to every
//! `Ready` client (spec §4.6 "broadcasts a JSON form to all Ready transport
//! clients"). Kept as a `DashMap` the way the connection registry this is
//! descended from tracked session clients, even though the dispatch actor
//! is itself single-threaded — transport I/O tasks insert/remove entries
//! from outside the dispatch loop.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use irccd_protocol::EventFrame;

use crate::transport::client::OutboundFrame;

/// Unique transport client identifier, assigned on accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    #[cfg(test)]
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// What the dispatcher knows about a connected transport client.
pub struct ClientEntry {
    /// Outbound frame sender for this client's write-side task. Carries
    /// both broadcast events and direct command responses, since each
    /// client has exactly one outbound channel back to its `Framed` sink.
    pub sender: mpsc::UnboundedSender<OutboundFrame>,
    /// Only `Ready` clients receive broadcasts (spec §4.4 state machine).
    /// Registration itself is deferred until banner + auth (if configured)
    /// complete (spec §4.4 "Authenticating"), so every registered client
    /// is marked ready immediately.
    pub ready: bool,
}

/// Registry of connected transport clients, indexed by [`ClientId`].
pub struct ClientRegistry {
    clients: DashMap<ClientId, ClientEntry>,
    next_id: AtomicU64,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, sender: mpsc::UnboundedSender<OutboundFrame>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.clients.insert(id, ClientEntry { sender, ready: false });
        debug!(client = %id, "transport client registered");
        id
    }

    pub fn unregister(&self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            debug!(client = %id, "transport client unregistered");
        }
    }

    pub fn mark_ready(&self, id: ClientId) {
        if let Some(mut entry) = self.clients.get_mut(&id) {
            entry.ready = true;
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Broadcast `frame` to every `Ready` client, dropping any whose
    /// receiver has hung up (its read-side task will unregister it).
    pub fn broadcast(&self, frame: &EventFrame) {
        for entry in self.clients.iter() {
            if entry.ready {
                let _ = entry.sender.send(OutboundFrame::Event(frame.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_empties_the_registry() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);
        assert_eq!(registry.len(), 1);
        registry.unregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_only_reaches_ready_clients() {
        let registry = ClientRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = registry.register(tx_a);
        let _b = registry.register(tx_b);
        registry.mark_ready(a);

        let frame = EventFrame::new("connect", "srv", serde_json::json!({}));
        registry.broadcast(&frame);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn ids_are_assigned_in_increasing_order() {
        let registry = ClientRegistry::new();
        let (tx1, _r1) = mpsc::unbounded_channel();
        let (tx2, _r2) = mpsc::unbounded_channel();
        let first = registry.register(tx1);
        let second = registry.register(tx2);
        assert!(first < second);
    }
}
