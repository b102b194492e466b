//! Local filesystem storage backend.
//!
//! Public files are served statically under `storage.public_url`. Signed URLs
//! point at this server's `/signed/` route and carry an expiry plus a blake3
//! keyed hash of path and expiry.

use super::{validate_path, StorageBackend, StorageError, StoredObject};
use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SIGNING_CONTEXT: &str = "carmarket-admin 2024 local storage signed url";

pub struct LocalStorage {
    /// Base path for file storage
    base_path: PathBuf,
    public_url: String,
    /// Where `/signed/...` is reachable, usually the site base URL.
    signed_base: String,
    signing_key: [u8; 32],
}

impl LocalStorage {
    /// The `base_path` directory will be created if it doesn't exist.
    pub fn new(
        base_path: PathBuf,
        public_url: &str,
        signed_base: &str,
        secret: &str,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;
        log::info!("LocalStorage initialized at {:?}", base_path);

        if secret.is_empty() {
            log::warn!("storage.signing_key is empty; signed URLs are forgeable.");
        }

        Ok(Self {
            base_path,
            public_url: public_url.trim_end_matches('/').to_string(),
            signed_base: signed_base.trim_end_matches('/').to_string(),
            signing_key: blake3::derive_key(SIGNING_CONTEXT, secret.as_bytes()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.base_path.join(validate_path(path)?))
    }

    fn token(&self, path: &str, expires: i64) -> blake3::Hash {
        blake3::keyed_hash(
            &self.signing_key,
            format!("{}\n{}", path, expires).as_bytes(),
        )
    }

    /// Builds a signed URL that expires at the given unix time.
    pub fn sign(&self, path: &str, expires: i64) -> Result<String, StorageError> {
        let path = validate_path(path)?;
        Ok(format!(
            "{}/signed/{}?expires={}&token={}",
            self.signed_base,
            path,
            expires,
            self.token(path, expires).to_hex()
        ))
    }

    /// Checks a signed request and returns the file it grants access to.
    pub fn verify(&self, path: &str, expires: i64, token: &str) -> Result<PathBuf, StorageError> {
        let path = validate_path(path)?;
        if expires < Utc::now().timestamp() {
            return Err(StorageError::InvalidSignature);
        }

        let given = blake3::Hash::from_hex(token).map_err(|_| StorageError::InvalidSignature)?;
        // Hash equality is constant time.
        if given != self.token(path, expires) {
            return Err(StorageError::InvalidSignature);
        }

        Ok(self.base_path.join(path))
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<StoredObject>,
) -> Result<(), std::io::Error> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        let path = entry.path();

        if meta.is_dir() {
            collect_files(root, &path, out)?;
        } else if meta.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let last_modified = meta.modified().ok().map(|t| {
                let datetime: chrono::DateTime<Utc> = t.into();
                datetime.to_rfc3339()
            });

            out.push(StoredObject {
                path: relative,
                size: Some(meta.len() as i64),
                last_modified,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let file = self.file_path(path)?;
        log::info!("LocalStorage: upload {:?} ({})", file, content_type);

        web::block(move || {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file, data)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let dir = self.file_path(prefix)?;
        let root = self.base_path.clone();

        let mut objects = web::block(move || -> Result<Vec<StoredObject>, std::io::Error> {
            let mut out = Vec::new();
            if dir.is_dir() {
                collect_files(&root, &dir, &mut out)?;
            }
            Ok(out)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    async fn remove(&self, paths: &[String]) -> Result<usize, StorageError> {
        let files = paths
            .iter()
            .map(|p| self.file_path(p))
            .collect::<Result<Vec<_>, _>>()?;

        let removed = web::block(move || -> Result<usize, std::io::Error> {
            let mut removed = 0;
            for file in files {
                match fs::remove_file(&file) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        log::debug!("LocalStorage: {:?} already gone", file);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(removed)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(removed)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_url, path.trim_start_matches('/'))
    }

    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError> {
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        self.sign(path, expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &tempfile::TempDir) -> LocalStorage {
        LocalStorage::new(
            dir.path().to_path_buf(),
            "http://localhost:8080/uploads/",
            "http://localhost:8080",
            "test-secret",
        )
        .unwrap()
    }

    #[test]
    fn test_signed_url_verifies_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let expires = Utc::now().timestamp() + 60;

        let url = storage.sign("corporate/tax.pdf", expires).unwrap();
        assert!(url.starts_with("http://localhost:8080/signed/corporate/tax.pdf?expires="));

        let token = url.rsplit("token=").next().unwrap();
        assert!(storage.verify("corporate/tax.pdf", expires, token).is_ok());
        assert!(storage.verify("corporate/other.pdf", expires, token).is_err());
        assert!(storage.verify("corporate/tax.pdf", expires + 1, token).is_err());

        let past = Utc::now().timestamp() - 1;
        let url = storage.sign("corporate/tax.pdf", past).unwrap();
        let token = url.rsplit("token=").next().unwrap();
        assert!(storage.verify("corporate/tax.pdf", past, token).is_err());
    }

    #[test]
    fn test_public_url_joins_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            storage(&dir).public_url("listings/a.jpg"),
            "http://localhost:8080/uploads/listings/a.jpg"
        );
    }

    #[actix_rt::test]
    async fn test_upload_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        storage
            .upload("damage/1/a.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        storage
            .upload("damage/1/b.jpg", vec![4], "image/jpeg")
            .await
            .unwrap();
        storage
            .upload("damage/2/c.jpg", vec![5], "image/jpeg")
            .await
            .unwrap();

        let listed = storage.list("damage/1").await.unwrap();
        let paths: Vec<&str> = listed.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["damage/1/a.jpg", "damage/1/b.jpg"]);
        assert_eq!(listed[0].size, Some(3));

        let removed = storage
            .remove(&["damage/1/a.jpg".to_string(), "damage/1/missing.jpg".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(storage.list("damage/1").await.unwrap().len(), 1);
        assert!(storage.list("nothing-here").await.unwrap().is_empty());
    }
}
