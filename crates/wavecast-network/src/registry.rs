//! Registry of open viewer connections and payload fan-out

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Identifier assigned to each accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending half of one connection's outbound queue.
///
/// The socket task holds the receiving half; once that task ends the handle
/// reports itself closed and sends are refused.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Bytes>,
    peer: Option<SocketAddr>,
}

impl ConnectionHandle {
    /// Create a handle together with the queue the socket task drains
    pub fn channel(peer: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, peer }, rx)
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Whether the socket task is still draining this queue
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a payload, returning `false` if the connection has gone away
    pub fn send(&self, payload: Bytes) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was queued on
    pub delivered: usize,
    /// Registered connections found closed or closing
    pub skipped: usize,
}

/// Set of currently registered connections.
///
/// `register` and `unregister` are the only mutators.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection, replacing any handle registered under the same id
    pub fn register(&mut self, id: ConnectionId, handle: ConnectionHandle) {
        debug!("Registering connection {} ({:?})", id, handle.peer());
        self.connections.insert(id, handle);
    }

    /// Remove a connection, returning its handle if it was registered
    pub fn unregister(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        let removed = self.connections.remove(&id);
        if removed.is_some() {
            debug!("Unregistered connection {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of registered connections that are still open
    pub fn open_count(&self) -> usize {
        self.connections.values().filter(|h| h.is_open()).count()
    }

    /// Send a payload to every open connection.
    ///
    /// Closed connections are skipped rather than treated as errors, including
    /// ones that close while the fan-out is in progress.
    pub fn broadcast(&self, payload: &Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (id, handle) in &self.connections {
            if handle.is_open() && handle.send(payload.clone()) {
                trace!("Queued {} bytes for {}", payload.len(), id);
                report.delivered += 1;
            } else {
                trace!("Skipping closed connection {}", id);
                report.skipped += 1;
            }
        }

        report
    }

    /// Send a payload to exactly one connection
    pub fn send_to_one(&self, id: ConnectionId, payload: &Bytes) -> bool {
        match self.connections.get(&id) {
            Some(handle) if handle.is_open() => handle.send(payload.clone()),
            Some(_) => {
                trace!("Connection {} closed before its payload was ready", id);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let mut registry = ClientRegistry::new();
        let id = ConnectionId::new();
        let (handle, _rx) = ConnectionHandle::channel(None);

        registry.register(id, handle);
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(id).is_some());
        assert!(registry.is_empty());
        assert!(registry.unregister(id).is_none());
    }

    #[test]
    fn test_broadcast_skips_closed() {
        let mut registry = ClientRegistry::new();
        let mut receivers = Vec::new();

        for _ in 0..3 {
            let (handle, rx) = ConnectionHandle::channel(None);
            registry.register(ConnectionId::new(), handle);
            receivers.push(rx);
        }

        // One viewer goes away before the broadcast
        drop(receivers.remove(1));
        assert_eq!(registry.open_count(), 2);

        let payload = Bytes::from_static(b"mesh");
        let report = registry.broadcast(&payload);
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                skipped: 1
            }
        );

        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap(), payload);
        }
    }

    #[test]
    fn test_send_to_one() {
        let mut registry = ClientRegistry::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let (handle_a, mut rx_a) = ConnectionHandle::channel(None);
        let (handle_b, mut rx_b) = ConnectionHandle::channel(None);
        registry.register(first, handle_a);
        registry.register(second, handle_b);

        let payload = Bytes::from_static(b"hello");
        assert!(registry.send_to_one(first, &payload));
        assert_eq!(rx_a.try_recv().unwrap(), payload);
        assert!(rx_b.try_recv().is_err());

        drop(rx_b);
        assert!(!registry.send_to_one(second, &payload));
        assert!(!registry.send_to_one(ConnectionId::new(), &payload));
    }

    #[test]
    fn test_broadcast_empty_registry() {
        let registry = ClientRegistry::new();
        let report = registry.broadcast(&Bytes::from_static(b"x"));
        assert_eq!(report, BroadcastReport::default());
    }
}
