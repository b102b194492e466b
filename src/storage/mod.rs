//! Object storage for uploaded documents and images.
//!
//! Supports multiple backends:
//! - `local`: Local filesystem storage, signed URLs served by this server
//! - `s3`: S3-compatible object storage (MinIO, AWS S3, etc.)
//!
//! Paths are plain relative keys such as `damage-reports/<id>/photo-ab12cd.jpg`.

pub mod local;
pub mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// An object found by `list`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub path: String,
    pub size: Option<i64>,
    pub last_modified: Option<String>,
}

/// Storage operation errors.
#[derive(Debug)]
pub enum StorageError {
    /// File not found
    NotFound(String),
    /// I/O error
    Io(std::io::Error),
    /// S3 error
    S3(String),
    /// Path is empty, absolute or escapes its folder
    InvalidPath(String),
    /// Signed URL expired or its token does not match
    InvalidSignature,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::S3(msg) => write!(f, "S3 error: {}", msg),
            StorageError::InvalidPath(path) => write!(f, "Invalid storage path: {:?}", path),
            StorageError::InvalidSignature => write!(f, "Invalid or expired signature"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Rejects keys that could escape the storage root.
pub fn validate_path(path: &str) -> Result<&str, StorageError> {
    let trimmed = path.trim_matches('/');
    let bad = trimmed.is_empty()
        || path.starts_with('/')
        || trimmed.contains('\\')
        || trimmed.contains('\0')
        || trimmed
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");

    if bad {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(trimmed)
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store `data` at `path`, replacing anything already there.
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Every object whose path starts with the folder `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    /// Delete objects. Missing paths are skipped. Returns how many were removed.
    async fn remove(&self, paths: &[String]) -> Result<usize, StorageError>;

    fn public_url(&self, path: &str) -> String;

    /// A time-limited download URL for private documents.
    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert_eq!(validate_path("docs/a.pdf").unwrap(), "docs/a.pdf");
        assert_eq!(validate_path("docs/a.pdf/").unwrap(), "docs/a.pdf");
        assert!(validate_path("").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("docs/../../secret").is_err());
        assert!(validate_path("docs//a.pdf").is_err());
        assert!(validate_path("docs\\a.pdf").is_err());
    }
}
