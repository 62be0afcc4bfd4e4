//! Conversation history retrieval.
//!
//! The store only answers efficient equality filters on a single directional
//! (sender, receiver) pair, so a two-party thread is the union of two
//! directional reads merged client-side. Sorting is total and deterministic:
//! `created_at` first, message id as tie-break, so repeated calls with no
//! intervening writes always produce the same sequence even when timestamps
//! collide.

use std::sync::Arc;

use crate::models::Message;
use crate::store::{MessageStore, StoreError};

pub struct ConversationReader {
    store: Arc<MessageStore>,
}

impl ConversationReader {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self { store }
    }

    /// Full thread between `my_id` and `other_id`, ascending by
    /// `(created_at, id)`.
    ///
    /// The two directional reads run concurrently; since sender and receiver
    /// differ on every message, no message can match both filters and the
    /// concatenation is duplicate-free by construction.
    pub async fn history(
        &self,
        my_id: &str,
        other_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let (mut messages, received) = tokio::try_join!(
            self.store.query_directional(my_id, other_id),
            self.store.query_directional(other_id, my_id),
        )?;

        messages.extend(received);
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (Arc<MessageStore>, ConversationReader) {
        let store = Arc::new(
            MessageStore::new(&dir.path().join("messages.sqlite"))
                .await
                .unwrap(),
        );
        let reader = ConversationReader::new(store.clone());
        (store, reader)
    }

    #[tokio::test]
    async fn test_history_merges_both_directions_in_order() {
        let dir = TempDir::new().unwrap();
        let (store, reader) = setup(&dir).await;

        store.append("alice", "bob", "one", "").await.unwrap();
        store.append("bob", "alice", "two", "").await.unwrap();
        store.append("alice", "bob", "three", "").await.unwrap();

        let thread = reader.history("alice", "bob").await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_history_is_symmetric() {
        let dir = TempDir::new().unwrap();
        let (store, reader) = setup(&dir).await;

        store.append("alice", "bob", "hi", "").await.unwrap();
        store.append("bob", "alice", "hello", "").await.unwrap();

        let from_alice = reader.history("alice", "bob").await.unwrap();
        let from_bob = reader.history("bob", "alice").await.unwrap();
        assert_eq!(from_alice, from_bob);
    }

    #[tokio::test]
    async fn test_history_excludes_third_parties() {
        let dir = TempDir::new().unwrap();
        let (store, reader) = setup(&dir).await;

        store.append("alice", "bob", "for bob", "").await.unwrap();
        store.append("alice", "carol", "for carol", "").await.unwrap();

        let thread = reader.history("alice", "bob").await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].text, "for bob");
    }

    #[tokio::test]
    async fn test_colliding_timestamps_order_deterministically() {
        let dir = TempDir::new().unwrap();
        let (store, reader) = setup(&dir).await;

        // Both sides write in the same instant; only the id can break the tie.
        let now = Utc::now();
        let a = store.append_at("alice", "bob", "same tick a", now).await.unwrap();
        let b = store.append_at("bob", "alice", "same tick b", now).await.unwrap();

        let first = reader.history("alice", "bob").await.unwrap();
        let second = reader.history("alice", "bob").await.unwrap();
        assert_eq!(first, second);

        let mut expected = vec![a, b];
        expected.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(first, expected);
    }

    #[tokio::test]
    async fn test_empty_thread() {
        let dir = TempDir::new().unwrap();
        let (_store, reader) = setup(&dir).await;
        assert!(reader.history("alice", "bob").await.unwrap().is_empty());
    }
}
