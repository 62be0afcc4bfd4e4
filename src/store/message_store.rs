//! Append-only message log over SQLite.
//!
//! The store owns the message clock: `id` and `created_at` are assigned here
//! at append time, never by callers. Each append is a single INSERT, so a
//! failed write leaves no partial record behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::Message;

/// Failure talking to the persistence layer. Fatal to the triggering
/// request; surfaced to callers as an opaque 5xx.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    /// Open (or create) the message database and run DDL.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                text TEXT NOT NULL DEFAULT '',
                image_url TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        // Point queries always filter on the full directional pair.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_direction \
             ON messages (sender_id, receiver_id)",
        )
        .execute(&pool)
        .await?;

        info!("[Store] Message log opened at {:?}", db_path);

        Ok(Self { pool })
    }

    /// Persist a new message, assigning its id and timestamps.
    pub async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        image_url: &str,
    ) -> Result<Message, StoreError> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
            image_url: image_url.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.insert(&message).await?;

        Ok(message)
    }

    /// All messages sent by `from_id` to `to_id`, in unspecified order.
    /// Chronological ordering is the conversation reader's job.
    pub async fn query_directional(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, sender_id, receiver_id, text, image_url, created_at, updated_at \
             FROM messages WHERE sender_id = ? AND receiver_id = ?",
        )
        .bind(from_id)
        .bind(to_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, text, image_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.text)
        .bind(&message.image_url)
        .bind(message.created_at.to_rfc3339())
        .bind(message.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Test-only append with a caller-controlled clock, for exercising
    /// ordering under timestamp collisions.
    #[cfg(test)]
    pub(crate) async fn append_at(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message, StoreError> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
            image_url: String::new(),
            created_at,
            updated_at: created_at,
        };
        self.insert(&message).await?;
        Ok(message)
    }
}

type MessageRow = (String, String, String, String, String, String, String);

fn row_to_message(row: MessageRow) -> Message {
    let (id, sender_id, receiver_id, text, image_url, created_at, updated_at) = row;
    Message {
        id,
        sender_id,
        receiver_id,
        text,
        image_url,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> MessageStore {
        MessageStore::new(&dir.path().join("messages.sqlite"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let before = Utc::now();
        let msg = store.append("alice", "bob", "hi", "").await.unwrap();
        let after = Utc::now();

        assert!(!msg.id.is_empty());
        assert!(msg.created_at >= before && msg.created_at <= after);
        assert_eq!(msg.created_at, msg.updated_at);
        assert_eq!(msg.sender_id, "alice");
        assert_eq!(msg.receiver_id, "bob");
    }

    #[tokio::test]
    async fn test_read_your_writes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let sent = store.append("alice", "bob", "hello", "").await.unwrap();

        let found = store.query_directional("alice", "bob").await.unwrap();
        assert_eq!(found, vec![sent]);
    }

    #[tokio::test]
    async fn test_directional_query_is_one_way() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.append("alice", "bob", "a->b", "").await.unwrap();
        store.append("bob", "alice", "b->a", "").await.unwrap();

        let a_to_b = store.query_directional("alice", "bob").await.unwrap();
        assert_eq!(a_to_b.len(), 1);
        assert_eq!(a_to_b[0].text, "a->b");

        let b_to_a = store.query_directional("bob", "alice").await.unwrap();
        assert_eq!(b_to_a.len(), 1);
        assert_eq!(b_to_a[0].text, "b->a");

        assert!(store
            .query_directional("alice", "carol")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_messages_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("messages.sqlite");

        {
            let store = MessageStore::new(&db).await.unwrap();
            store.append("alice", "bob", "durable", "").await.unwrap();
        }

        let store = MessageStore::new(&db).await.unwrap();
        let found = store.query_directional("alice", "bob").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "durable");
    }
}
