//! Per-instance registry of live solver push connections.
//!
//! Connections register an mpsc sender keyed by solver id. Broadcast is
//! best-effort: any send failure (closed or full channel) removes the
//! registration immediately, so the registry cannot grow past the set of
//! live connections. Cross-instance delivery is handled by the
//! [`Reconciler`](super::Reconciler) polling the authoritative store.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{Order, OrderId, SolverId};

use super::StreamMessage;

/// Fan-out hub for order events.
pub struct NotificationHub {
    connections: DashMap<SolverId, mpsc::Sender<StreamMessage>>,
    buffer: usize,
    announced: Mutex<HashSet<OrderId>>,
}

impl NotificationHub {
    /// Create a hub whose per-connection buffers hold `buffer` messages.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            buffer: buffer.max(1),
            announced: Mutex::new(HashSet::new()),
        }
    }

    /// Broadcast a new open order and record it as announced, so the
    /// reconciliation sweep does not announce the same order again.
    pub fn announce_order(&self, order: Order) {
        self.announced.lock().insert(order.id.clone());
        self.broadcast(&StreamMessage::NewOrder {
            order: Box::new(order),
        });
    }

    #[must_use]
    pub(crate) fn is_announced(&self, id: &OrderId) -> bool {
        self.announced.lock().contains(id)
    }

    /// Drop announced ids that left the open set, keeping the set bounded
    /// and letting a reopened order be announced afresh.
    pub(crate) fn retain_announced(&self, open: &HashSet<OrderId>) {
        self.announced.lock().retain(|id| open.contains(id));
    }

    /// Register a solver connection. A reconnect for the same solver
    /// replaces the previous registration, closing its channel. The guard
    /// owns the hub handle so stream handlers can move it into a
    /// long-lived task.
    pub fn register(self: &Arc<Self>, solver: SolverId) -> (ConnectionGuard, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.connections.insert(solver.clone(), tx.clone());
        debug!(solver = %solver, connections = self.connections.len(), "solver connected");
        (ConnectionGuard { hub: Arc::clone(self), solver, tx }, rx)
    }

    /// Send to every locally connected solver, dropping dead registrations.
    pub fn broadcast(&self, message: &StreamMessage) {
        self.connections.retain(|solver, tx| {
            match tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(solver = %solver, "dropping dead push connection");
                    false
                }
            }
        });
    }

    /// Send to a single solver, if locally connected.
    pub fn send_to(&self, solver: &SolverId, message: StreamMessage) {
        let dead = match self.connections.get(solver) {
            Some(tx) => tx.try_send(message).is_err(),
            None => false,
        };
        if dead {
            self.connections.remove(solver);
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn deregister(&self, solver: &SolverId, tx: &mpsc::Sender<StreamMessage>) {
        // A reconnect may have replaced this registration already; only
        // remove the entry if it is still ours.
        self.connections
            .remove_if(solver, |_, current| current.same_channel(tx));
        debug!(solver = %solver, connections = self.connections.len(), "solver disconnected");
    }
}

/// Removes the connection's registration when the stream handler drops it,
/// making cleanup deterministic on disconnect.
pub struct ConnectionGuard {
    hub: Arc<NotificationHub>,
    solver: SolverId,
    tx: mpsc::Sender<StreamMessage>,
}

impl ConnectionGuard {
    #[must_use]
    pub fn solver(&self) -> &SolverId {
        &self.solver
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.deregister(&self.solver, &self.tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn broadcast_reaches_registered_connections() {
        let hub = Arc::new(NotificationHub::new(8));
        let (_guard, mut rx) = hub.register(SolverId::new("s1"));

        hub.broadcast(&StreamMessage::Ping { at: Utc::now() });
        assert!(matches!(rx.recv().await, Some(StreamMessage::Ping { .. })));
    }

    #[tokio::test]
    async fn guard_drop_deregisters() {
        let hub = Arc::new(NotificationHub::new(8));
        {
            let (_guard, _rx) = hub.register(SolverId::new("s1"));
            assert_eq!(hub.connection_count(), 1);
        }
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn dead_receiver_is_removed_on_broadcast() {
        let hub = Arc::new(NotificationHub::new(8));
        let (guard, rx) = hub.register(SolverId::new("s1"));
        drop(rx);

        hub.broadcast(&StreamMessage::Ping { at: Utc::now() });
        assert_eq!(hub.connection_count(), 0);
        drop(guard);
    }

    #[tokio::test]
    async fn full_buffer_drops_the_connection() {
        let hub = Arc::new(NotificationHub::new(1));
        let (_guard, _rx) = hub.register(SolverId::new("s1"));

        hub.broadcast(&StreamMessage::Ping { at: Utc::now() });
        // Second send finds the buffer full and evicts the connection.
        hub.broadcast(&StreamMessage::Ping { at: Utc::now() });
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_registration() {
        let hub = Arc::new(NotificationHub::new(8));
        let (g1, _rx1) = hub.register(SolverId::new("s1"));
        let (_g2, mut rx2) = hub.register(SolverId::new("s1"));
        assert_eq!(hub.connection_count(), 1);

        // The stale guard must not tear down the new registration.
        drop(g1);
        assert_eq!(hub.connection_count(), 1);

        hub.send_to(&SolverId::new("s1"), StreamMessage::Ping { at: Utc::now() });
        assert!(matches!(rx2.recv().await, Some(StreamMessage::Ping { .. })));
    }
}
