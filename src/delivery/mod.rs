//! Message delivery coordination.
//!
//! Persistence is authoritative, live push is a latency optimization layered
//! on top. A send first appends to the durable store; only on success does it
//! fan the message out to whatever sessions the receiver currently has. Push
//! failures are contained here and never reach the sender, who only ever
//! learns whether the message was durably stored.

use std::sync::Arc;

use tracing::debug;

use crate::models::{Message, PushEvent};
use crate::presence::PresenceRegistry;
use crate::store::{MessageStore, StoreError};

pub struct DeliveryCoordinator {
    store: Arc<MessageStore>,
    presence: Arc<PresenceRegistry>,
}

impl DeliveryCoordinator {
    pub fn new(store: Arc<MessageStore>, presence: Arc<PresenceRegistry>) -> Self {
        Self { store, presence }
    }

    /// Persist a message and push it to the receiver's live sessions.
    ///
    /// Returns the stored record once the append succeeds, regardless of
    /// whether any live delivery happened. An append failure aborts the whole
    /// operation before any push is attempted. Offline receivers get the
    /// message on their next history pull; no retry or queueing happens here.
    pub async fn send(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        image_url: &str,
    ) -> Result<Message, StoreError> {
        let message = self
            .store
            .append(sender_id, receiver_id, text, image_url)
            .await?;

        let delivered = self
            .presence
            .push(receiver_id, &PushEvent::NewMessage(message.clone()));
        debug!(
            "[Delivery] Message {} stored; pushed to {} live session(s) of {}",
            message.id, delivered, receiver_id
        );

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    async fn setup(dir: &TempDir) -> (Arc<PresenceRegistry>, DeliveryCoordinator) {
        let store = Arc::new(
            MessageStore::new(&dir.path().join("messages.sqlite"))
                .await
                .unwrap(),
        );
        let presence = Arc::new(PresenceRegistry::new());
        let coordinator = DeliveryCoordinator::new(store, presence.clone());
        (presence, coordinator)
    }

    #[tokio::test]
    async fn test_send_pushes_to_connected_receiver() {
        let dir = TempDir::new().unwrap();
        let (presence, coordinator) = setup(&dir).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.connect("bob", tx);

        let stored = coordinator.send("alice", "bob", "hi bob", "").await.unwrap();

        match rx.recv().await {
            Some(PushEvent::NewMessage(pushed)) => assert_eq!(pushed, stored),
            other => panic!("expected NewMessage push, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_to_offline_receiver_still_succeeds() {
        let dir = TempDir::new().unwrap();
        let (_presence, coordinator) = setup(&dir).await;

        let stored = coordinator.send("alice", "bob", "hi", "").await.unwrap();
        assert_eq!(stored.text, "hi");
    }

    #[tokio::test]
    async fn test_dead_session_does_not_fail_send() {
        let dir = TempDir::new().unwrap();
        let (presence, coordinator) = setup(&dir).await;

        let (tx, rx) = mpsc::unbounded_channel();
        presence.connect("bob", tx);
        drop(rx); // receiver task gone, push will fail

        let stored = coordinator.send("alice", "bob", "hi", "").await.unwrap();
        assert_eq!(stored.text, "hi");
    }

    #[tokio::test]
    async fn test_sender_does_not_receive_own_push() {
        let dir = TempDir::new().unwrap();
        let (presence, coordinator) = setup(&dir).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.connect("alice", tx);

        coordinator.send("alice", "bob", "hi", "").await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
