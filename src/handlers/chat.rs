//! Message handlers: conversation history and sending.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::info;

use super::require_user;
use crate::config::AppState;
use crate::error::ApiResult;
use crate::models::{Message, SendMessageRequest};

/// GET /messages/{user_id}
///
/// Full thread between the caller and `user_id`, ascending by
/// `(createdAt, id)`. Possibly empty.
pub async fn get_history(
    Path(user_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Message>>> {
    let user = require_user(&headers, &state).await?;
    info!("GET /messages/{} - for {}", user_id, user.id);

    let messages = state.conversations.history(&user.id, &user_id).await?;
    Ok(Json(messages))
}

/// POST /messages/{user_id}
///
/// Persist a message to `user_id` and push it to their live sessions. An
/// inline base64 `image` is stored as a blob first; its URL lands on the
/// message. Returns 201 with the stored record; a store failure is the only
/// way this fails once the caller is authenticated.
pub async fn send_message(
    Path(user_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let user = require_user(&headers, &state).await?;
    info!("POST /messages/{} - from {}", user_id, user.id);

    let image_url = match input.image.as_deref() {
        Some(payload) if !payload.is_empty() => state.blobs.store_inline_image(payload).await?,
        _ => String::new(),
    };
    let text = input.text.unwrap_or_default();

    let message = state
        .delivery
        .send(&user.id, &user_id, &text, &image_url)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
