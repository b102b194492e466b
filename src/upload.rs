//! File upload helper.
//!
//! Size and type are checked before anything reaches storage. Files land at
//! `<folder>/<stem>-<random suffix>.<ext>`, so repeated uploads of the same
//! name never collide. Replacing a file does not remove the previous object;
//! callers delete the old record themselves.

use crate::error::ActionError;
use crate::storage::{validate_path, StorageBackend, StorageError};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

const SUFFIX_LEN: usize = 12;
const MAX_STEM_LEN: usize = 48;

#[derive(Debug)]
pub enum UploadError {
    Empty,
    TooLarge { size: usize, max_mb: u32 },
    TypeNotAllowed(String),
    InvalidFolder(String),
    Storage(StorageError),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::Empty => write!(f, "The file is empty."),
            UploadError::TooLarge { size, max_mb } => write!(
                f,
                "The file is {:.1} MB; the limit is {} MB.",
                *size as f64 / (1024.0 * 1024.0),
                max_mb
            ),
            UploadError::TypeNotAllowed(t) => write!(f, "Files of type {} are not allowed.", t),
            UploadError::InvalidFolder(folder) => write!(f, "Invalid upload folder {:?}.", folder),
            UploadError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<StorageError> for UploadError {
    fn from(e: StorageError) -> Self {
        UploadError::Storage(e)
    }
}

impl From<UploadError> for ActionError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Storage(e) => ActionError::Remote(e.to_string()),
            other => ActionError::Validation(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_size_mb: u32,
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config() -> Self {
        let limits = crate::app_config::limits();
        Self {
            max_size_mb: limits.max_upload_size_mb,
            allowed_types: limits.allowed_upload_types,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_size_mb as usize * 1024 * 1024
    }

    pub fn validate(&self, content_type: &str, size: usize) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_bytes() {
            return Err(UploadError::TooLarge {
                size,
                max_mb: self.max_size_mb,
            });
        }

        // Ignore parameters such as `; charset=...`.
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !self
            .allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&essence))
        {
            return Err(UploadError::TypeNotAllowed(essence));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub path: String,
    pub url: String,
}

fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let out: String = out.trim_matches('-').chars().take(MAX_STEM_LEN).collect();
    if out.is_empty() {
        "file".to_string()
    } else {
        out
    }
}

/// Extension for a stored object. A known content type wins over the client's
/// filename, which only fills in for types without a mapping.
fn extension_for(filename: &str, content_type: &str) -> String {
    let from_type = match content_type.parse::<mime::Mime>() {
        Ok(m) if m == mime::IMAGE_JPEG => Some("jpg"),
        Ok(m) if m == mime::IMAGE_PNG => Some("png"),
        Ok(m) if m == mime::IMAGE_GIF => Some("gif"),
        Ok(m) if m == mime::APPLICATION_PDF => Some("pdf"),
        Ok(m) if m.essence_str() == "image/webp" => Some("webp"),
        _ => None,
    };
    if let Some(ext) = from_type {
        return ext.to_string();
    }

    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// Storage path for a new upload.
pub fn storage_path(folder: &str, filename: &str, content_type: &str) -> Result<String, UploadError> {
    let folder = validate_path(folder)
        .map_err(|_| UploadError::InvalidFolder(folder.to_string()))?;

    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = base.rsplit_once('.').map(|(s, _)| s).unwrap_or(base);

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();

    Ok(format!(
        "{}/{}-{}.{}",
        folder,
        sanitize_stem(stem),
        suffix,
        extension_for(base, content_type)
    ))
}

/// Validates, stores and returns where the file can be fetched from.
pub async fn upload_file(
    storage: &dyn StorageBackend,
    policy: &UploadPolicy,
    folder: &str,
    filename: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<StoredFile, UploadError> {
    policy.validate(content_type, bytes.len())?;
    let path = storage_path(folder, filename, content_type)?;

    storage.upload(&path, bytes, content_type).await?;
    log::info!("Stored upload {}", path);

    Ok(StoredFile {
        url: storage.public_url(&path),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> UploadPolicy {
        UploadPolicy {
            max_size_mb: 1,
            allowed_types: vec!["image/jpeg".to_string(), "application/pdf".to_string()],
        }
    }

    #[test]
    fn test_size_limit() {
        let p = policy();
        assert!(p.validate("image/jpeg", 1024 * 1024).is_ok());
        assert!(matches!(
            p.validate("image/jpeg", 1024 * 1024 + 1),
            Err(UploadError::TooLarge { .. })
        ));
        assert!(matches!(p.validate("image/jpeg", 0), Err(UploadError::Empty)));
    }

    #[test]
    fn test_type_allow_list_ignores_parameters_and_case() {
        let p = policy();
        assert!(p.validate("Image/JPEG", 10).is_ok());
        assert!(p.validate("application/pdf; name=x.pdf", 10).is_ok());
        assert!(matches!(
            p.validate("image/svg+xml", 10),
            Err(UploadError::TypeNotAllowed(_))
        ));
    }

    #[test]
    fn test_storage_path_shape() {
        let path = storage_path("damage-reports/42", "My Car (front).JPG", "image/jpeg").unwrap();
        let (folder, file) = path.rsplit_once('/').unwrap();
        assert_eq!(folder, "damage-reports/42");
        assert!(file.starts_with("my-car-front-"));
        assert!(file.ends_with(".jpg"));
        assert_eq!(file.len(), "my-car-front-".len() + SUFFIX_LEN + ".jpg".len());

        let other = storage_path("damage-reports/42", "My Car (front).JPG", "image/jpeg").unwrap();
        assert_ne!(path, other);
    }

    #[test]
    fn test_extension_falls_back_to_content_type() {
        let path = storage_path("docs", "scan", "application/pdf").unwrap();
        assert!(path.ends_with(".pdf"));
        assert!(storage_path("../escape", "a.pdf", "application/pdf").is_err());
    }

    #[test]
    fn test_content_type_beats_filename_extension() {
        let path = storage_path("listings/3", "a.exe", "image/jpeg").unwrap();
        assert!(path.starts_with("listings/3/a-"));
        assert!(path.ends_with(".jpg"));

        let path = storage_path("listings/3", "photo.jpeg", "image/png").unwrap();
        assert!(path.ends_with(".png"));

        // Unmapped types keep a sane filename extension.
        let path = storage_path("docs", "notes.TXT", "text/plain").unwrap();
        assert!(path.ends_with(".txt"));
        let path = storage_path("docs", "notes", "text/plain").unwrap();
        assert!(path.ends_with(".bin"));
    }
}
