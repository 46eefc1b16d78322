//! S3-compatible storage backend using rust-s3 library
//!
//! Used for AWS S3, custom S3 endpoints (MinIO and friends) and, through
//! [`S3Provider::new_r2`], Cloudflare R2.

use super::{
    sanitize_key, DownloadResult, DownloadedObject, ListOptions, ObjectInfo, StorageProvider,
    UploadOptions, UploadResult, DEFAULT_CONTENT_TYPE,
};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use std::time::Duration;
use strata_core::{ProviderKind, S3Config};

/// Longest presign expiry S3 accepts (7 days)
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

/// Check if an error indicates the object was not found
fn is_not_found_error(err: &s3::error::S3Error) -> bool {
    matches!(err, s3::error::S3Error::HttpFailWithBody(404, _))
}

/// S3-compatible storage backend
pub struct S3Provider {
    bucket: Bucket,
    bucket_name: String,
    kind: ProviderKind,
}

impl S3Provider {
    /// Create AWS S3 storage from config
    pub fn new_s3(config: &S3Config) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region));

        Self::new_with_endpoint(
            ProviderKind::S3,
            &config.access_key_id,
            &config.secret_access_key,
            &config.region,
            &config.bucket,
            &endpoint,
        )
    }

    /// Create S3 storage against a custom endpoint
    pub(super) fn new_with_endpoint(
        kind: ProviderKind,
        access_key: &str,
        secret: &str,
        region: &str,
        bucket_name: &str,
        endpoint: &str,
    ) -> Result<Self> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret), None, None, None)
            .map_err(|e| StorageError::Configuration(format!("Invalid S3 credentials: {}", e)))?;

        let bucket = *Bucket::new(bucket_name, region, credentials)
            .map_err(|e| {
                StorageError::Configuration(format!(
                    "Failed to create S3 bucket '{}' at {}: {}",
                    bucket_name, endpoint, e
                ))
            })?
            .with_path_style();

        tracing::debug!(
            "Created {} storage for bucket '{}' at {}",
            kind,
            bucket_name,
            endpoint
        );

        Ok(Self {
            bucket,
            bucket_name: bucket_name.to_string(),
            kind,
        })
    }

    async fn try_upload(&self, key: &str, data: &[u8], options: &UploadOptions) -> Result<UploadResult> {
        // Per-request headers go on a copy so the shared bucket never changes
        let mut bucket = self.bucket.clone();
        if let Some(disposition) = &options.content_disposition {
            bucket.add_header("Content-Disposition", disposition);
        }
        for (name, value) in &options.metadata {
            bucket.add_header(&format!("x-amz-meta-{}", name), value);
        }

        let response = bucket
            .put_object_with_content_type(key, data, options.content_type_or_default())
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Provider(format!(
                "S3 put_object returned status {}",
                status
            )));
        }

        let etag = response
            .headers()
            .get("etag")
            .map(|v| v.trim_matches('"').to_string());

        Ok(UploadResult::Success {
            key: key.to_string(),
            etag,
            size: data.len() as u64,
        })
    }

    async fn try_download(&self, key: &str) -> Result<DownloadedObject> {
        let response = self.bucket.get_object(key).await?;

        let content_type = response
            .headers()
            .get("content-type")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let data = Bytes::from(response.to_vec());

        Ok(DownloadedObject {
            size: data.len() as u64,
            data,
            content_type,
        })
    }

    async fn try_list(&self, prefix: &str, options: &ListOptions) -> Result<Vec<ObjectInfo>> {
        let (page, _) = self
            .bucket
            .list_page(
                prefix.to_string(),
                None,
                options.continuation_token.clone(),
                None,
                options.max_keys,
            )
            .await?;

        let mut objects: Vec<ObjectInfo> = page
            .contents
            .into_iter()
            .map(|object| ObjectInfo {
                last_modified: DateTime::parse_from_rfc3339(&object.last_modified)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
                etag: object
                    .e_tag
                    .map(|e| e.trim_matches('"').to_string())
                    .unwrap_or_default(),
                size: object.size,
                key: object.key,
            })
            .collect();

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }

    async fn upload(&self, key: &str, data: &[u8], options: UploadOptions) -> UploadResult {
        let key = sanitize_key(key);
        match self.try_upload(&key, data, &options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(bucket = %self.bucket_name, key = %key, "S3 put_object failed: {}", e);
                UploadResult::Failure {
                    key,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn download(&self, key: &str) -> DownloadResult {
        let key = sanitize_key(key);
        match self.try_download(&key).await {
            Ok(object) => DownloadResult::Success(object),
            Err(e) => {
                tracing::debug!(bucket = %self.bucket_name, key = %key, "S3 get_object failed: {}", e);
                DownloadResult::Failure {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        match self.bucket.delete_object(&key).await {
            Ok(_) => true,
            Err(e) if is_not_found_error(&e) => true,
            Err(e) => {
                tracing::error!(bucket = %self.bucket_name, key = %key, "S3 delete_object failed: {}", e);
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        match self.bucket.head_object(&key).await {
            Ok(_) => true,
            Err(e) if is_not_found_error(&e) => false,
            Err(e) => {
                tracing::warn!(bucket = %self.bucket_name, key = %key, "Failed to check if object exists: {}", e);
                false
            }
        }
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> Vec<ObjectInfo> {
        let prefix = sanitize_key(prefix);
        self.try_list(&prefix, &options).await.unwrap_or_else(|e| {
            tracing::error!(bucket = %self.bucket_name, prefix = %prefix, "S3 list_objects failed: {}", e);
            Vec::new()
        })
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let key = sanitize_key(key);
        let expiry = expires_in.as_secs();
        if !(1..=MAX_PRESIGN_SECS).contains(&expiry) {
            return Err(StorageError::Provider(format!(
                "Signed URL expiry must be between 1 and {} seconds, got {}",
                MAX_PRESIGN_SECS, expiry
            )));
        }
        let url = self.bucket.presign_get(&key, expiry as u32, None).await?;
        Ok(url)
    }
}
