//! Courier Chat Server Library
//!
//! Direct-message backend: durable message history over SQLite plus
//! best-effort live delivery to connected WebSocket clients.

pub mod auth;
pub mod blobs;
pub mod config;
pub mod conversation;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::AuthManager;
use blobs::BlobStore;
use config::{AppState, ServerConfig};
use conversation::ConversationReader;
use delivery::DeliveryCoordinator;
use handlers::{
    get_blob, get_history, list_users, login, logout, me, send_message, signup,
    subscribe_events, update_profile, upload_blob,
};
use presence::PresenceRegistry;
use store::MessageStore;

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    info!("=== Courier Chat Server ===");

    let config = ServerConfig::default();
    config.ensure_dirs().await?;

    info!("Data directory: {:?}", config.data_dir);

    let auth = Arc::new(AuthManager::new(&config.users_db).await?);
    let store = Arc::new(MessageStore::new(&config.messages_db).await?);
    let presence = Arc::new(PresenceRegistry::new());
    let conversations = Arc::new(ConversationReader::new(store.clone()));
    let delivery = Arc::new(DeliveryCoordinator::new(store.clone(), presence.clone()));
    let blobs = Arc::new(BlobStore::new(config.blob_dir.clone()));

    let app_state = AppState {
        auth,
        store,
        presence,
        conversations,
        delivery,
        blobs,
    };

    let app = Router::new()
        // Auth endpoints
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/profile", put(update_profile))
        .route("/users", get(list_users))
        // Conversation history + send
        .route("/messages/{user_id}", get(get_history).post(send_message))
        // Live delivery
        .route("/events", get(subscribe_events))
        // Blob endpoints
        .route("/blobs", post(upload_blob))
        .route("/blobs/{hash}", get(get_blob))
        // Health check
        .route("/health", get(health_check))
        .with_state(app_state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    info!("Listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - Courier Chat Server"
}
