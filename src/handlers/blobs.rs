//! Blob upload/download handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{error, info};

use crate::blobs::url_for;
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::BlobRef;

/// POST /blobs
pub async fn upload_blob(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<BlobRef>)> {
    info!("POST /blobs - uploading blob");

    let mut content_type = None;
    let mut data = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {}", e);
        ApiError::BadRequest("Malformed multipart body".to_string())
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            content_type = field.content_type().map(|s| s.to_string());
            data = Some(field.bytes().await.map_err(|e| {
                error!("Failed to read file data: {}", e);
                ApiError::BadRequest("Malformed multipart body".to_string())
            })?);
        }
    }

    let data = data.ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;
    let content_type =
        content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let hash = state.blobs.put(&data, Some(&content_type)).await?;

    Ok((
        StatusCode::CREATED,
        Json(BlobRef {
            url: url_for(&hash),
            hash,
            content_type,
            size: data.len() as u64,
        }),
    ))
}

/// GET /blobs/{hash}
pub async fn get_blob(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<(HeaderMap, axum::body::Bytes)> {
    info!("GET /blobs/{}", hash);

    let (data, content_type) = state
        .blobs
        .get(&hash)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut headers = HeaderMap::new();
    if let Ok(value) = content_type
        .unwrap_or_else(|| "application/octet-stream".to_string())
        .parse()
    {
        headers.insert(http::header::CONTENT_TYPE, value);
    }

    Ok((headers, data))
}
