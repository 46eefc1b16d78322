//! Local filesystem storage

use super::{
    sanitize_key, DownloadResult, DownloadedObject, ListOptions, ObjectInfo, StorageProvider,
    UploadOptions, UploadResult, DEFAULT_CONTENT_TYPE,
};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_core::{LocalConfig, ProviderKind};
use tokio::fs;

/// Marker in temp file names written during upload
///
/// Sanitized keys never contain `..`, so no stored object can carry it.
const PARTIAL_MARKER: &str = "..partial.";

/// Local filesystem storage backend
///
/// Object metadata and content types are not persisted; downloads report
/// `application/octet-stream`.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    root: PathBuf,
    bucket_name: String,
}

impl LocalProvider {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            root: config.root.clone(),
            bucket_name: config.bucket.clone().unwrap_or_else(|| "local".to_string()),
        }
    }

    /// Create a local storage rooted at a specific path
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::new(&LocalConfig {
            root: root.into(),
            bucket: None,
        })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn try_upload(&self, key: &str, data: &[u8]) -> Result<UploadResult> {
        if key.is_empty() {
            return Err(StorageError::Provider("Empty object key".to_string()));
        }

        let full_path = self.full_path(key);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never observe a half-written object
        let temp_path = PathBuf::from(format!(
            "{}{}{}",
            full_path.display(),
            PARTIAL_MARKER,
            uuid::Uuid::new_v4()
        ));
        fs::write(&temp_path, data).await?;
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            fs::remove_file(&temp_path).await.ok();
            return Err(e.into());
        }

        Ok(UploadResult::Success {
            key: key.to_string(),
            etag: None,
            size: data.len() as u64,
        })
    }

    /// Walk the root and collect every stored object
    async fn collect_objects(&self) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if key.contains(PARTIAL_MARKER) {
                    continue;
                }

                objects.push(ObjectInfo {
                    key,
                    size: metadata.len(),
                    last_modified: metadata
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_default(),
                    etag: String::new(),
                });
            }
        }

        Ok(objects)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }

    async fn upload(&self, key: &str, data: &[u8], _options: UploadOptions) -> UploadResult {
        let key = sanitize_key(key);
        match self.try_upload(&key, data).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(root = %self.root.display(), key = %key, "Local write failed: {}", e);
                UploadResult::Failure {
                    key,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn download(&self, key: &str) -> DownloadResult {
        let key = sanitize_key(key);
        match fs::read(self.full_path(&key)).await {
            Ok(data) => DownloadResult::Success(DownloadedObject {
                size: data.len() as u64,
                data: Bytes::from(data),
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
            }),
            Err(e) => DownloadResult::Failure {
                error: format!("Failed to read {}: {}", key, e),
            },
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        match fs::remove_file(self.full_path(&key)).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                tracing::error!(root = %self.root.display(), key = %key, "Local delete failed: {}", e);
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        if key.is_empty() {
            return false;
        }
        match fs::metadata(self.full_path(&key)).await {
            Ok(metadata) => metadata.is_file(),
            Err(_) => false,
        }
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> Vec<ObjectInfo> {
        let prefix = sanitize_key(prefix);
        let mut objects = match self.collect_objects().await {
            Ok(objects) => objects,
            Err(e) => {
                tracing::error!(root = %self.root.display(), prefix = %prefix, "Local list failed: {}", e);
                return Vec::new();
            }
        };

        objects.retain(|o| o.key.starts_with(&prefix));
        if let Some(token) = &options.continuation_token {
            objects.retain(|o| o.key.as_str() > token.as_str());
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(max_keys) = options.max_keys {
            objects.truncate(max_keys);
        }

        objects
    }

    async fn signed_url(&self, key: &str, _expires_in: Duration) -> Result<String> {
        let key = sanitize_key(key);
        let full_path = self.full_path(&key);
        if !fs::try_exists(&full_path).await? {
            return Err(StorageError::Provider(format!("Object not found: {}", key)));
        }
        Ok(format!("file://{}", full_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_and_download() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        let result = storage
            .upload("/reports/test.txt", b"hello", UploadOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.key(), "reports/test.txt");

        let object = storage.download("reports/test.txt").await.into_object().unwrap();
        assert_eq!(object.data.as_ref(), b"hello");
        assert_eq!(object.size, 5);
        assert_eq!(object.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_upload_overwrites() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        storage.upload("a.txt", b"first", UploadOptions::default()).await;
        storage.upload("a.txt", b"second", UploadOptions::default()).await;

        let object = storage.download("a.txt").await.into_object().unwrap();
        assert_eq!(object.data.as_ref(), b"second");
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        assert!(!storage.exists("missing.txt").await);
        storage.upload("exists.txt", b"data", UploadOptions::default()).await;
        assert!(storage.exists("exists.txt").await);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_an_error() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        let result = storage.download("nope/missing.json").await;
        assert!(!result.is_success());
        assert!(result.error().is_some());
        assert!(!storage.exists("nope/missing.json").await);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        storage.upload("gone.txt", b"data", UploadOptions::default()).await;
        assert!(storage.delete("gone.txt").await);
        assert!(!storage.exists("gone.txt").await);
        assert!(storage.delete("gone.txt").await);
    }

    #[tokio::test]
    async fn test_traversal_stays_inside_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let storage = LocalProvider::with_root(&root);

        let result = storage
            .upload("../../escape.txt", b"data", UploadOptions::default())
            .await;
        assert_eq!(result.key(), "escape.txt");
        assert!(root.join("escape.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_list_with_prefix_and_paging() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        for key in ["p/c.txt", "p/a.txt", "p/b.txt", "other/d.txt"] {
            storage.upload(key, b"x", UploadOptions::default()).await;
        }

        let keys: Vec<String> = storage
            .list("p/", ListOptions::default())
            .await
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["p/a.txt", "p/b.txt", "p/c.txt"]);

        let page = storage
            .list(
                "p/",
                ListOptions {
                    max_keys: Some(1),
                    continuation_token: Some("p/a.txt".to_string()),
                },
            )
            .await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].key, "p/b.txt");
        assert_eq!(page[0].size, 1);
    }

    #[tokio::test]
    async fn test_list_keeps_partial_named_objects() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        storage
            .upload("exports/report.partial", b"x", UploadOptions::default())
            .await;
        std::fs::write(
            dir.path().join(format!("exports/report.csv{}in-flight", PARTIAL_MARKER)),
            b"half",
        )
        .unwrap();

        let keys: Vec<String> = storage
            .list("exports/", ListOptions::default())
            .await
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["exports/report.partial"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path().join("does-not-exist"));
        assert!(storage.list("", ListOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_connection_check_succeeds() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        let result = storage.test_connection().await;
        assert!(result.success);
        assert!(result.can_write && result.can_read && result.can_delete);
        assert!(result.error.is_none());
        assert!(storage.list("", ListOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_signed_url() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::with_root(dir.path());

        assert!(storage
            .signed_url("missing.txt", Duration::from_secs(60))
            .await
            .is_err());

        storage.upload("file.txt", b"x", UploadOptions::default()).await;
        let url = storage
            .signed_url("file.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("file.txt"));
    }
}
