//! Live event delivery over WebSocket.
//!
//! Each connected client holds one WebSocket session backed by an unbounded
//! channel registered in the presence registry. The session task is the only
//! writer to its socket; pushes that arrive for a gone session fail on the
//! channel and are dropped by the registry. Connect and disconnect both
//! broadcast the current online-user list to everyone still connected.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::bearer_token;
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::PushEvent;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Session token; query-string fallback for WebSocket clients that
    /// cannot set an Authorization header.
    pub token: Option<String>,
}

/// GET /events
pub async fn subscribe_events(
    ws: WebSocketUpgrade,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let token = query
        .token
        .as_deref()
        .or_else(|| bearer_token(&headers))
        .ok_or(ApiError::Unauthorized)?;

    let user = state
        .auth
        .validate_session(token)
        .await
        .map_err(|_| ApiError::Unauthorized)?;

    Ok(ws.on_upgrade(move |socket| client_session(socket, state, user.id)))
}

async fn client_session(socket: WebSocket, state: AppState, identity: String) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = state.presence.connect(&identity, tx);
    info!("[Events] {} connected (session {})", identity, handle.id);

    state
        .presence
        .broadcast(&PushEvent::OnlineUsers(state.presence.online_identities()));

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if sink.send(WsMessage::Text(json.into())).await.is_err() {
                    debug!("[Events] Send to {} failed, closing session {}", identity, handle.id);
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    // Clients only listen on this socket; inbound frames are ignored.
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Deregister before anything else so no further pushes target this
    // session, then tell the remaining clients who is still online.
    state.presence.disconnect(&handle);
    state
        .presence
        .broadcast(&PushEvent::OnlineUsers(state.presence.online_identities()));
    info!("[Events] {} disconnected (session {})", identity, handle.id);
}
