//! Google Cloud Storage backend using the object_store crate

use super::{
    sanitize_key, DownloadResult, DownloadedObject, ListOptions, ObjectInfo, StorageProvider,
    UploadOptions, UploadResult, DEFAULT_CONTENT_TYPE,
};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload};
use std::borrow::Cow;
use std::time::Duration;
use strata_core::{GcsConfig, ProviderKind};

/// Check if an error indicates the object was not found
fn is_not_found_error(err: &object_store::Error) -> bool {
    matches!(err, object_store::Error::NotFound { .. })
}

/// Google Cloud Storage backend
#[derive(Debug)]
pub struct GcsProvider {
    store: GoogleCloudStorage,
    bucket_name: String,
}

impl GcsProvider {
    /// Create GCS storage from config
    pub fn new(config: &GcsConfig) -> Result<Self> {
        serde_json::from_str::<serde_json::Value>(&config.service_account_key).map_err(|e| {
            StorageError::Configuration(format!("Failed to parse GCS service account key: {}", e))
        })?;

        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&config.bucket)
            .with_service_account_key(&config.service_account_key)
            .build()
            .map_err(|e| {
                StorageError::Configuration(format!("Failed to initialize GCS client: {}", e))
            })?;

        tracing::debug!(
            "Created GCS storage for bucket '{}' in project '{}'",
            config.bucket,
            config.project_id
        );

        Ok(Self {
            store,
            bucket_name: config.bucket.clone(),
        })
    }

    async fn try_upload(
        &self,
        key: &str,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<UploadResult> {
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            options.content_type_or_default().to_string().into(),
        );
        if let Some(disposition) = &options.content_disposition {
            attributes.insert(Attribute::ContentDisposition, disposition.clone().into());
        }
        for (name, value) in &options.metadata {
            attributes.insert(
                Attribute::Metadata(Cow::Owned(name.clone())),
                value.clone().into(),
            );
        }

        let put_options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result = self
            .store
            .put_opts(
                &ObjectPath::from(key),
                PutPayload::from(Bytes::copy_from_slice(data)),
                put_options,
            )
            .await?;

        Ok(UploadResult::Success {
            key: key.to_string(),
            etag: result.e_tag,
            size: data.len() as u64,
        })
    }

    async fn try_download(&self, key: &str) -> Result<DownloadedObject> {
        let result = self.store.get(&ObjectPath::from(key)).await?;

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let data = result.bytes().await?;

        Ok(DownloadedObject {
            size: data.len() as u64,
            data,
            content_type,
        })
    }

    /// object_store lists by path segment, so list the parent "directory" of
    /// the prefix and keep the keys that start with the full prefix string
    async fn try_list(&self, prefix: &str, options: &ListOptions) -> Result<Vec<ObjectInfo>> {
        let parent = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let parent_path = (!parent.is_empty()).then(|| ObjectPath::from(parent));

        let metas: Vec<ObjectMeta> = match &options.continuation_token {
            Some(token) => {
                self.store
                    .list_with_offset(parent_path.as_ref(), &ObjectPath::from(token.as_str()))
                    .try_collect()
                    .await?
            }
            None => self.store.list(parent_path.as_ref()).try_collect().await?,
        };

        let mut objects: Vec<ObjectInfo> = metas
            .into_iter()
            .filter(|meta| meta.location.as_ref().starts_with(prefix))
            .map(|meta| ObjectInfo {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
                etag: meta.e_tag.unwrap_or_default(),
            })
            .collect();

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(max_keys) = options.max_keys {
            objects.truncate(max_keys);
        }

        Ok(objects)
    }
}

#[async_trait]
impl StorageProvider for GcsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gcs
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }

    async fn upload(&self, key: &str, data: &[u8], options: UploadOptions) -> UploadResult {
        let key = sanitize_key(key);
        match self.try_upload(&key, data, &options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(bucket = %self.bucket_name, key = %key, "GCS upload failed: {}", e);
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
                tracing::debug!(bucket = %self.bucket_name, key = %key, "GCS download failed: {}", e);
                DownloadResult::Failure {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        match self.store.delete(&ObjectPath::from(key.as_str())).await {
            Ok(()) => true,
            Err(e) if is_not_found_error(&e) => true,
            Err(e) => {
                tracing::error!(bucket = %self.bucket_name, key = %key, "GCS delete failed: {}", e);
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        match self.store.head(&ObjectPath::from(key.as_str())).await {
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
            tracing::error!(bucket = %self.bucket_name, prefix = %prefix, "GCS list failed: {}", e);
            Vec::new()
        })
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let key = sanitize_key(key);
        let url = self
            .store
            .signed_url(http::Method::GET, &ObjectPath::from(key.as_str()), expires_in)
            .await?;
        Ok(url.to_string())
    }
}
