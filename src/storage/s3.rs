//! S3-compatible storage backend.

use super::{validate_path, StorageBackend, StorageError, StoredObject};
use crate::app_config::StorageConfig;
use async_trait::async_trait;
use rusoto_core::credential::{
    AwsCredentials, DefaultCredentialsProvider, ProvideAwsCredentials, StaticProvider,
};
use rusoto_core::{HttpClient, Region};
use rusoto_s3::util::{PreSignedRequest, PreSignedRequestOption};
use rusoto_s3::{
    Delete, DeleteObjectsRequest, GetObjectRequest, ListObjectsV2Request, ObjectIdentifier,
    PutObjectRequest, S3Client, S3,
};
use std::time::Duration;

/// Upper bound on keys returned by a single `list`.
const LIST_PAGE_SIZE: i64 = 1000;

pub struct S3Storage {
    s3: S3Client,
    region: Region,
    /// Static keys from config; None falls back to the default provider chain.
    credentials: Option<AwsCredentials>,
    bucket_name: String,
    pub pub_url: String,
}

impl S3Storage {
    pub fn new(
        region: Region,
        bucket_name: String,
        pub_url: String,
        credentials: Option<AwsCredentials>,
    ) -> Result<S3Storage, StorageError> {
        log::info!("S3Storage initialized for bucket: {}", bucket_name);

        let s3 = match &credentials {
            Some(creds) => {
                let http = HttpClient::new().map_err(|e| StorageError::S3(e.to_string()))?;
                let provider = StaticProvider::new_minimal(
                    creds.aws_access_key_id().to_string(),
                    creds.aws_secret_access_key().to_string(),
                );
                S3Client::new_with(http, provider, region.clone())
            }
            None => S3Client::new(region.clone()),
        };

        Ok(S3Storage {
            s3,
            region,
            credentials,
            bucket_name,
            pub_url: pub_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<S3Storage, StorageError> {
        let region = Region::Custom {
            name: config.s3_region.clone(),
            endpoint: config.s3_endpoint.clone(),
        };
        let credentials = if config.s3_access_key.is_empty() {
            None
        } else {
            Some(AwsCredentials::new(
                config.s3_access_key.clone(),
                config.s3_secret_key.clone(),
                None,
                None,
            ))
        };

        Self::new(
            region,
            config.s3_bucket.clone(),
            config.s3_public_url.clone(),
            credentials,
        )
    }

    async fn credentials(&self) -> Result<AwsCredentials, StorageError> {
        if let Some(creds) = &self.credentials {
            return Ok(creds.clone());
        }
        DefaultCredentialsProvider::new()
            .map_err(|e| StorageError::S3(e.to_string()))?
            .credentials()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let key = validate_path(path)?.to_string();
        log::info!("S3Storage: upload {} ({})", key, content_type);

        let request = PutObjectRequest {
            bucket: self.bucket_name.clone(),
            key,
            body: Some(data.into()),
            content_type: Some(content_type.to_string()),
            ..Default::default()
        };

        self.s3
            .put_object(request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let prefix = format!("{}/", validate_path(prefix)?);
        log::debug!("S3Storage: list {}", prefix);

        let request = ListObjectsV2Request {
            bucket: self.bucket_name.clone(),
            prefix: Some(prefix),
            max_keys: Some(LIST_PAGE_SIZE),
            ..Default::default()
        };

        let output = self
            .s3
            .list_objects_v2(request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(output
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|o| {
                Some(StoredObject {
                    path: o.key?,
                    size: o.size,
                    last_modified: o.last_modified,
                })
            })
            .collect())
    }

    async fn remove(&self, paths: &[String]) -> Result<usize, StorageError> {
        if paths.is_empty() {
            return Ok(0);
        }

        let objects = paths
            .iter()
            .map(|p| {
                Ok(ObjectIdentifier {
                    key: validate_path(p)?.to_string(),
                    version_id: None,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        let requested = objects.len();

        let request = DeleteObjectsRequest {
            bucket: self.bucket_name.clone(),
            delete: Delete {
                objects,
                quiet: Some(true),
            },
            ..Default::default()
        };

        let output = self
            .s3
            .delete_objects(request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        let failed = output.errors.map(|e| e.len()).unwrap_or(0);
        if failed > 0 {
            log::warn!("S3Storage: {} of {} deletes failed", failed, requested);
        }
        Ok(requested - failed)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.pub_url, path.trim_start_matches('/'))
    }

    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError> {
        let request = GetObjectRequest {
            bucket: self.bucket_name.clone(),
            key: validate_path(path)?.to_string(),
            ..Default::default()
        };

        let credentials = self.credentials().await?;
        Ok(request.get_presigned_url(
            &self.region,
            &credentials,
            &PreSignedRequestOption { expires_in },
        ))
    }
}
