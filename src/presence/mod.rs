//! Volatile connection/presence registry.
//!
//! Maps a user identity to its live WebSocket sessions. State is process-local
//! and lost on restart; it is rebuilt entirely from connect/disconnect events,
//! so there is nothing to persist or recover. The lock is synchronous and is
//! never held across an await point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::models::PushEvent;

pub type ConnectionId = u64;

/// Opaque reference to one live transport session, tagged with the identity
/// that authenticated it. Returned by [`PresenceRegistry::connect`] and used
/// to deregister the exact same session later.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub identity: String,
}

#[derive(Default)]
pub struct PresenceRegistry {
    connections: RwLock<HashMap<String, HashMap<ConnectionId, UnboundedSender<PushEvent>>>>,
    next_id: AtomicU64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live session for `identity`. One identity may hold any
    /// number of simultaneous sessions (multi-device).
    pub fn connect(
        &self,
        identity: &str,
        sender: UnboundedSender<PushEvent>,
    ) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .write()
            .entry(identity.to_string())
            .or_default()
            .insert(id, sender);
        ConnectionHandle {
            id,
            identity: identity.to_string(),
        }
    }

    /// Remove a session. No-op when the handle is already gone, so a
    /// disconnect racing another disconnect is harmless.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        let mut connections = self.connections.write();
        if let Some(sessions) = connections.get_mut(&handle.identity) {
            sessions.remove(&handle.id);
            if sessions.is_empty() {
                connections.remove(&handle.identity);
            }
        }
    }

    /// Snapshot of the outbound queues registered for `identity`. Never
    /// blocks; an empty result just means the user is offline.
    pub fn lookup(&self, identity: &str) -> Vec<UnboundedSender<PushEvent>> {
        self.connections
            .read()
            .get(identity)
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every identity with at least one live session.
    pub fn online_identities(&self) -> Vec<String> {
        self.connections.read().keys().cloned().collect()
    }

    /// Deliver `event` to every live session of `identity`, best-effort.
    /// Returns the number of sessions the event was queued for. Sessions
    /// whose receiving task has gone away are pruned on the spot.
    pub fn push(&self, identity: &str, event: &PushEvent) -> usize {
        let targets: Vec<(ConnectionId, UnboundedSender<PushEvent>)> = self
            .connections
            .read()
            .get(identity)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in targets {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            debug!(
                "[Presence] Pruning {} dead session(s) for {}",
                dead.len(),
                identity
            );
            let mut connections = self.connections.write();
            if let Some(sessions) = connections.get_mut(identity) {
                for id in dead {
                    sessions.remove(&id);
                }
                if sessions.is_empty() {
                    connections.remove(identity);
                }
            }
        }

        delivered
    }

    /// Deliver `event` to every live session of every identity, best-effort.
    pub fn broadcast(&self, event: &PushEvent) {
        let identities = self.online_identities();
        for identity in identities {
            self.push(&identity, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_connect_lookup_disconnect() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = registry.connect("alice", tx);
        assert_eq!(registry.lookup("alice").len(), 1);
        assert_eq!(registry.online_identities(), vec!["alice".to_string()]);

        registry.disconnect(&handle);
        assert!(registry.lookup("alice").is_empty());
        assert!(registry.online_identities().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_noop() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = registry.connect("alice", tx);
        registry.disconnect(&handle);
        registry.disconnect(&handle);
        assert!(registry.lookup("alice").is_empty());
    }

    #[tokio::test]
    async fn test_multi_device_lookup() {
        let registry = PresenceRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let phone = registry.connect("alice", tx1);
        let _laptop = registry.connect("alice", tx2);
        assert_eq!(registry.lookup("alice").len(), 2);
        // Still one identity online.
        assert_eq!(registry.online_identities().len(), 1);

        registry.disconnect(&phone);
        assert_eq!(registry.lookup("alice").len(), 1);
    }

    #[tokio::test]
    async fn test_push_reaches_every_session() {
        let registry = PresenceRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.connect("alice", tx1);
        registry.connect("alice", tx2);

        let delivered = registry.push("alice", &PushEvent::OnlineUsers(vec!["alice".into()]));
        assert_eq!(delivered, 2);
        assert!(matches!(rx1.recv().await, Some(PushEvent::OnlineUsers(_))));
        assert!(matches!(rx2.recv().await, Some(PushEvent::OnlineUsers(_))));
    }

    #[tokio::test]
    async fn test_push_to_offline_identity_delivers_nothing() {
        let registry = PresenceRegistry::new();
        let delivered = registry.push("nobody", &PushEvent::OnlineUsers(vec![]));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_push_prunes_dead_sessions() {
        let registry = PresenceRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.connect("alice", tx);
        drop(rx);

        let delivered = registry.push("alice", &PushEvent::OnlineUsers(vec![]));
        assert_eq!(delivered, 0);
        assert!(registry.lookup("alice").is_empty());
        assert!(registry.online_identities().is_empty());
    }
}
