//! Versioned artifact cache on top of tenant storage
//!
//! Cache entries are JSON objects stored under the per-organization provider.
//! The cache never fails its caller: resolution errors, read failures and
//! corrupt payloads are all misses, and write failures are logged and dropped.

mod batch;
pub mod key;

use crate::error::{Result, StorageError};
use crate::storage::{ProviderResolver, StorageProvider, UploadOptions, UploadResult};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info};

pub use batch::{BatchItem, BATCH_SIZE};
pub use key::{composite_key, generate_key, generate_legacy_key, CacheEntryKey, CACHE_PREFIX};

/// Content type of every cache entry
pub const CACHE_CONTENT_TYPE: &str = "application/json";

/// An artifact that can be stored in the cache
pub trait CacheableArtifact: Serialize + DeserializeOwned + Send + Sync {
    /// Overwrite the artifact's own identifier
    fn set_artifact_id(&mut self, artifact_id: &str);

    /// Number of records carried by the artifact
    fn record_count(&self) -> usize;
}

/// Cached result of a metric query
///
/// Fields other than `metricId` and `data` are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricData {
    #[serde(default)]
    pub metric_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CacheableArtifact for MetricData {
    fn set_artifact_id(&mut self, artifact_id: &str) {
        self.metric_id = artifact_id.to_string();
    }

    fn record_count(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

/// Artifact cache keyed by organization, artifact, context and version
pub struct ArtifactCache<R: ProviderResolver> {
    resolver: R,
}

impl<R: ProviderResolver> ArtifactCache<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Fetch a cached artifact
    ///
    /// A versioned lookup that misses is retried once against the legacy
    /// unversioned key.
    pub async fn get<A: CacheableArtifact>(
        &self,
        organization_id: &str,
        artifact_id: &str,
        context_id: &str,
        version: Option<u32>,
    ) -> Option<A> {
        let entry = CacheEntryKey::new(organization_id, artifact_id, context_id, version);
        let provider = match self.resolver.resolve(organization_id).await {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    organization_id,
                    error_type = e.error_type(),
                    "Cache read skipped, no storage provider: {}",
                    e
                );
                return None;
            }
        };

        let key = entry.storage_key();
        let mut object = provider.download(&key).await.into_object();
        if object.is_none() {
            if let Some(legacy_key) = entry.fallback_key() {
                debug!(key = %key, legacy_key = %legacy_key, "Versioned entry missing, trying legacy key");
                object = provider.download(&legacy_key).await.into_object();
            }
        }

        let Some(object) = object else {
            info!(organization_id, artifact_id, context_id, ?version, "Cache miss");
            return None;
        };

        match decode_artifact::<A>(&object.data) {
            Ok(mut artifact) => {
                artifact.set_artifact_id(artifact_id);
                info!(
                    organization_id,
                    artifact_id,
                    context_id,
                    ?version,
                    row_count = artifact.record_count(),
                    "Cache hit"
                );
                Some(artifact)
            }
            Err(e) => {
                error!(
                    key = %key,
                    error_type = e.error_type(),
                    "Discarding unreadable cache entry: {}",
                    e
                );
                None
            }
        }
    }

    /// Store an artifact under its versioned key
    ///
    /// Failures are logged, never returned.
    pub async fn set<A: CacheableArtifact>(
        &self,
        organization_id: &str,
        artifact_id: &str,
        context_id: &str,
        artifact: &A,
        version: Option<u32>,
    ) {
        let entry = CacheEntryKey::new(organization_id, artifact_id, context_id, version);
        if let Err(e) = self.try_set(&entry, artifact).await {
            error!(
                organization_id,
                artifact_id,
                context_id,
                error_type = e.error_type(),
                "Failed to write cache entry: {}",
                e
            );
        }
    }

    async fn try_set<A: CacheableArtifact>(&self, entry: &CacheEntryKey, artifact: &A) -> Result<()> {
        let provider = self.resolver.resolve(&entry.organization_id).await?;

        let payload = serde_json::to_vec(artifact).map_err(|e| {
            StorageError::Corruption(format!("failed to serialize artifact: {}", e))
        })?;
        let options = UploadOptions {
            content_type: Some(CACHE_CONTENT_TYPE.to_string()),
            content_disposition: None,
            metadata: entry_metadata(entry, artifact.record_count()),
        };

        match provider.upload(&entry.storage_key(), &payload, options).await {
            UploadResult::Success { key, size, .. } => {
                info!(
                    organization_id = %entry.organization_id,
                    key = %key,
                    bucket = %provider.bucket(),
                    size_bytes = size,
                    "Cache entry written"
                );
                Ok(())
            }
            UploadResult::Failure { error, .. } => Err(StorageError::Provider(error)),
        }
    }

    /// Whether an entry exists, with the same legacy fallback as [`Self::get`]
    pub async fn exists(
        &self,
        organization_id: &str,
        artifact_id: &str,
        context_id: &str,
        version: Option<u32>,
    ) -> bool {
        match self.resolver.resolve(organization_id).await {
            Ok(provider) => {
                let entry = CacheEntryKey::new(organization_id, artifact_id, context_id, version);
                entry_exists(provider.as_ref(), &entry).await
            }
            Err(e) => {
                error!(
                    organization_id,
                    error_type = e.error_type(),
                    "Cache existence check skipped, no storage provider: {}",
                    e
                );
                false
            }
        }
    }
}

async fn entry_exists(provider: &dyn StorageProvider, entry: &CacheEntryKey) -> bool {
    if provider.exists(&entry.storage_key()).await {
        return true;
    }
    match entry.fallback_key() {
        Some(legacy_key) => provider.exists(&legacy_key).await,
        None => false,
    }
}

fn decode_artifact<A: CacheableArtifact>(data: &[u8]) -> Result<A> {
    Ok(serde_json::from_slice(data)?)
}

fn entry_metadata(entry: &CacheEntryKey, record_count: usize) -> HashMap<String, String> {
    let version = entry
        .version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unversioned".to_string());

    HashMap::from([
        ("organization-id".to_string(), entry.organization_id.clone()),
        ("artifact-id".to_string(), entry.artifact_id.clone()),
        ("context-id".to_string(), entry.context_id.clone()),
        ("version".to_string(), version),
        ("row-count".to_string(), record_count.to_string()),
        (
            "cached-at".to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    ])
}
