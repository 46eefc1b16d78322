//! Storage module for tenant objects
//!
//! Supports multiple storage backends:
//! - AWS S3 (and S3-compatible endpoints)
//! - Cloudflare R2
//! - Google Cloud Storage
//! - Local filesystem
//!
//! Every backend implements [`StorageProvider`]. Recoverable backend failures
//! never escape as errors: they are logged and turned into the operation's
//! failure shape. Only [`StorageProvider::signed_url`] returns a `Result`.

mod factory;
mod gcs;
mod local;
mod r2;
mod resolver;
mod s3;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_core::ProviderKind;
use tracing::warn;

pub use factory::{create_provider, default_provider, test_credentials, test_credentials_json};
pub use gcs::GcsProvider;
pub use local::LocalProvider;
pub use r2::r2_endpoint;
pub use resolver::{
    integration_secret_name, CredentialResolver, IntegrationLookup, ProviderResolver, SecretStore,
};
pub use s3::S3Provider;

/// Content type used when the caller or the backend does not provide one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Options for [`StorageProvider::upload`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl UploadOptions {
    pub fn with_content_type(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Outcome of an upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadResult {
    Success {
        key: String,
        etag: Option<String>,
        size: u64,
    },
    Failure {
        key: String,
        error: String,
    },
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }

    /// Sanitized key the upload was addressed to
    pub fn key(&self) -> &str {
        match self {
            UploadResult::Success { key, .. } | UploadResult::Failure { key, .. } => key,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            UploadResult::Success { .. } => None,
            UploadResult::Failure { error, .. } => Some(error),
        }
    }
}

/// A downloaded object
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedObject {
    pub data: Bytes,
    pub content_type: String,
    pub size: u64,
}

/// Outcome of a download
///
/// Missing objects and permission failures are both a `Failure`: a cache miss
/// is an expected result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadResult {
    Success(DownloadedObject),
    Failure { error: String },
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadResult::Success(_))
    }

    pub fn into_object(self) -> Option<DownloadedObject> {
        match self {
            DownloadResult::Success(object) => Some(object),
            DownloadResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DownloadResult::Success(_) => None,
            DownloadResult::Failure { error } => Some(error),
        }
    }
}

/// Paging options for [`StorageProvider::list`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub max_keys: Option<usize>,
    /// Resume listing after this token (the last key of a previous page)
    pub continuation_token: Option<String>,
}

/// Listed object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
}

/// Result of a write / read / delete permission check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trait for storage backends
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Backend family of this provider
    fn kind(&self) -> ProviderKind;

    /// Bucket (or root) this provider is bound to
    fn bucket(&self) -> &str;

    /// Write an object, overwriting any existing one
    async fn upload(&self, key: &str, data: &[u8], options: UploadOptions) -> UploadResult;

    /// Read an object
    async fn download(&self, key: &str) -> DownloadResult;

    /// Delete an object. Not-found counts as deleted.
    async fn delete(&self, key: &str) -> bool;

    /// Check if an object exists. Errors count as absent.
    async fn exists(&self, key: &str) -> bool;

    /// List objects under a prefix, ordered by key. Errors yield an empty list.
    async fn list(&self, prefix: &str, options: ListOptions) -> Vec<ObjectInfo>;

    /// Generate a time-limited read URL
    ///
    /// An expiry the backend cannot honor (S3 and R2 accept 1 second to
    /// 7 days) is an error, never silently shortened.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String>;

    /// Check write, read and delete permissions, in that order
    async fn test_connection(&self) -> ConnectionTestResult {
        let check_key = format!("_test_connection_{}.txt", uuid::Uuid::new_v4());

        let upload = self
            .upload(
                &check_key,
                b"test",
                UploadOptions::with_content_type("text/plain"),
            )
            .await;
        if let UploadResult::Failure { error, .. } = upload {
            return ConnectionTestResult {
                error: Some(format!("Cannot write to bucket: {}", error)),
                ..Default::default()
            };
        }

        if let DownloadResult::Failure { error } = self.download(&check_key).await {
            // Best-effort cleanup, does not count as a delete check
            if !self.delete(&check_key).await {
                warn!(key = %check_key, "Failed to clean up connection check object");
            }
            return ConnectionTestResult {
                can_write: true,
                error: Some(format!("Cannot read from bucket: {}", error)),
                ..Default::default()
            };
        }

        if !self.delete(&check_key).await {
            return ConnectionTestResult {
                can_write: true,
                can_read: true,
                error: Some("Cannot delete from bucket".to_string()),
                ..Default::default()
            };
        }

        ConnectionTestResult {
            success: true,
            can_read: true,
            can_write: true,
            can_delete: true,
            error: None,
        }
    }
}

/// Implement StorageProvider for Arc<dyn StorageProvider> to allow sharing
#[async_trait]
impl StorageProvider for Arc<dyn StorageProvider> {
    fn kind(&self) -> ProviderKind {
        (**self).kind()
    }

    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    async fn upload(&self, key: &str, data: &[u8], options: UploadOptions) -> UploadResult {
        (**self).upload(key, data, options).await
    }

    async fn download(&self, key: &str) -> DownloadResult {
        (**self).download(key).await
    }

    async fn delete(&self, key: &str) -> bool {
        (**self).delete(key).await
    }

    async fn exists(&self, key: &str) -> bool {
        (**self).exists(key).await
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> Vec<ObjectInfo> {
        (**self).list(prefix, options).await
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        (**self).signed_url(key, expires_in).await
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        (**self).test_connection().await
    }
}

/// Normalize an object key
///
/// Leading slashes are stripped, every `..` is removed, then runs of `/` are
/// collapsed. Traversal removal must come before collapsing.
pub fn sanitize_key(key: &str) -> String {
    let mut sanitized = key.trim_start_matches('/').to_string();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "");
    }

    let mut collapsed = String::with_capacity(sanitized.len());
    let mut previous_slash = false;
    for ch in sanitized.chars() {
        if ch == '/' {
            if !previous_slash {
                collapsed.push(ch);
            }
            previous_slash = true;
        } else {
            collapsed.push(ch);
            previous_slash = false;
        }
    }

    // Removing ".." can expose a new leading slash ("../x" -> "/x")
    collapsed.trim_start_matches('/').to_string()
}
