//! Content-addressed blob storage for image attachments.
//!
//! Blobs are keyed by the SHA-256 of their content and written atomically
//! (temp file + rename). The rest of the system only ever sees the resulting
//! `/blobs/{hash}` URL string.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 payload")]
    InvalidPayload(#[from] base64::DecodeError),
}

pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.dir.join(hash)
    }

    /// Store `data`, returning its content hash. Re-uploading identical
    /// content lands on the same hash and is a cheap overwrite.
    pub async fn put(&self, data: &[u8], content_type: Option<&str>) -> Result<String, BlobError> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let hash = format!("{:x}", hasher.finalize());

        let path = self.blob_path(&hash);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &path).await?;

        if let Some(content_type) = content_type {
            fs::write(path.with_extension("mime"), content_type).await?;
        }

        info!("[Blobs] Stored blob {} ({} bytes)", hash, data.len());
        Ok(hash)
    }

    /// Fetch a blob and its recorded content type, if present.
    pub async fn get(&self, hash: &str) -> Result<Option<(Bytes, Option<String>)>, BlobError> {
        if !is_valid_hash(hash) {
            return Ok(None);
        }

        let path = self.blob_path(hash);
        match fs::read(&path).await {
            Ok(data) => {
                let content_type = fs::read_to_string(path.with_extension("mime")).await.ok();
                Ok(Some((Bytes::from(data), content_type)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode an inline base64 image (optionally a `data:` URL), store it,
    /// and return the URL the stored blob is served under.
    pub async fn store_inline_image(&self, payload: &str) -> Result<String, BlobError> {
        let (content_type, encoded) = split_data_url(payload);
        let data = BASE64.decode(encoded.trim())?;
        let hash = self.put(&data, content_type).await?;
        Ok(url_for(&hash))
    }
}

/// Public URL a blob hash is served under.
pub fn url_for(hash: &str) -> String {
    format!("/blobs/{hash}")
}

// Hashes are lowercase hex; anything else is rejected before it can touch
// the filesystem.
fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

// "data:image/png;base64,AAAA" -> (Some("image/png"), "AAAA")
fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    let Some(rest) = payload.strip_prefix("data:") else {
        return (None, payload);
    };
    match rest.split_once(";base64,") {
        Some((content_type, encoded)) => (Some(content_type), encoded),
        None => (None, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> BlobStore {
        fs::create_dir_all(dir.path().join("blobs")).await.unwrap();
        BlobStore::new(dir.path().join("blobs"))
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let hash = store.put(b"image bytes", Some("image/png")).await.unwrap();
        let (data, content_type) = store.get(&hash).await.unwrap().unwrap();
        assert_eq!(data, Bytes::from_static(b"image bytes"));
        assert_eq!(content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_get_missing_blob() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let absent = "0".repeat(64);
        assert!(store.get(&absent).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_rejects_malformed_hash() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert!(store.get("../../etc/passwd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_inline_data_url() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let payload = format!("data:image/png;base64,{}", BASE64.encode(b"pixels"));
        let url = store.store_inline_image(&payload).await.unwrap();

        let hash = url.strip_prefix("/blobs/").unwrap();
        let (data, content_type) = store.get(hash).await.unwrap().unwrap();
        assert_eq!(data, Bytes::from_static(b"pixels"));
        assert_eq!(content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_store_inline_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert!(store.store_inline_image("not base64 !!!").await.is_err());
    }
}
