//! Server configuration and shared state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::blobs::BlobStore;
use crate::conversation::ConversationReader;
use crate::delivery::DeliveryCoordinator;
use crate::presence::PresenceRegistry;
use crate::store::MessageStore;

/// Configuration for the chat server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Base data directory
    pub data_dir: PathBuf,
    /// Blob storage directory
    pub blob_dir: PathBuf,
    /// User/session database
    pub users_db: PathBuf,
    /// Message log database
    pub messages_db: PathBuf,
    /// Listen address
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = std::env::var("COURIER_DATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("courier_data"));
        let bind_addr = std::env::var("COURIER_ADDR")
            .ok()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3001)));
        Self::with_base_dir(data_dir, bind_addr)
    }
}

impl ServerConfig {
    /// Create config rooted at a custom base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>, bind_addr: SocketAddr) -> Self {
        let data_dir = base_dir.into();
        Self {
            blob_dir: data_dir.join("blobs"),
            users_db: data_dir.join("users.sqlite"),
            messages_db: data_dir.join("messages.sqlite"),
            data_dir,
            bind_addr,
        }
    }

    /// Ensure all directories exist.
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::create_dir_all(&self.blob_dir).await?;
        Ok(())
    }
}

/// App state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub store: Arc<MessageStore>,
    pub presence: Arc<PresenceRegistry>,
    pub conversations: Arc<ConversationReader>,
    pub delivery: Arc<DeliveryCoordinator>,
    pub blobs: Arc<BlobStore>,
}
