use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single direct message between two users.
///
/// Messages are immutable once persisted: `id` and `created_at` are assigned
/// by the store at append time and never change, and `created_at` is the
/// ordering key for conversation history. Either `text` or `image_url` may be
/// empty; callers are expected to supply at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event pushed to connected clients over their WebSocket session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum PushEvent {
    /// A new message addressed to (or visible to) this client.
    #[serde(rename = "newMessage")]
    NewMessage(Message),
    /// Snapshot of every identity with at least one live connection.
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<String>),
}

/// Input for sending a message.
///
/// `image` carries an inline base64 payload (optionally a data URL); it is
/// stored as a blob and the message records the resulting URL.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Reference to a stored blob, returned by the upload endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    pub hash: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
}
