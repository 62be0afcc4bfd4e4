//! Auth handlers

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{bearer_token, require_user};
use crate::auth::UserInfo;
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub profile_pic: String,
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    info!("POST /auth/signup - {}", req.email);

    if req.full_name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    state
        .auth
        .signup(req.email.clone(), req.full_name, req.password.clone())
        .await
        .map_err(|e| {
            warn!("Signup failed for {}: {}", req.email, e);
            ApiError::BadRequest(e.to_string())
        })?;

    let (user, session) = state.auth.login(req.email, req.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            user,
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    info!("POST /auth/login - {}", req.email);

    let (user, session) = state
        .auth
        .login(req.email.clone(), req.password)
        .await
        .map_err(|e| {
            warn!("Login failed for {}: {}", req.email, e);
            ApiError::InvalidCredentials
        })?;

    Ok(Json(AuthResponse {
        token: session.token,
        user,
    }))
}

/// POST /auth/logout
pub async fn logout(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<StatusCode> {
    info!("POST /auth/logout");

    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    state.auth.logout(token).await?;

    Ok(StatusCode::OK)
}

/// GET /auth/me
pub async fn me(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<Json<UserInfo>> {
    let user = require_user(&headers, &state).await?;
    Ok(Json(user))
}

/// PUT /auth/profile
///
/// Accepts an inline base64 profile picture, stores it as a blob, and
/// records the blob URL on the user.
pub async fn update_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserInfo>> {
    let user = require_user(&headers, &state).await?;
    info!("PUT /auth/profile - {}", user.id);

    if req.profile_pic.is_empty() {
        return Err(ApiError::BadRequest(
            "Profile pic is required".to_string(),
        ));
    }

    let url = state.blobs.store_inline_image(&req.profile_pic).await?;
    let updated = state.auth.update_profile_pic(&user.id, &url).await?;

    Ok(Json(updated))
}

/// GET /users
///
/// Contact sidebar: every registered user except the caller.
pub async fn list_users(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<UserInfo>>> {
    let user = require_user(&headers, &state).await?;
    info!("GET /users - for {}", user.id);

    let users = state.auth.list_users_except(&user.id).await?;
    Ok(Json(users))
}
