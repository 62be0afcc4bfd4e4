//! HTTP and WebSocket handlers.

pub mod auth;
pub mod blobs;
pub mod chat;
pub mod events;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::UserInfo;
use crate::config::AppState;
use crate::error::ApiError;

pub use auth::{list_users, login, logout, me, signup, update_profile};
pub use blobs::{get_blob, upload_blob};
pub use chat::{get_history, send_message};
pub use events::subscribe_events;

/// Extract the bearer token from an Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the calling user from the request headers or reject with 401.
pub(crate) async fn require_user(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<UserInfo, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    state
        .auth
        .validate_session(token)
        .await
        .map_err(|_| ApiError::Unauthorized)
}
