//! Batched existence checks

use super::{entry_exists, ArtifactCache, CacheEntryKey};
use crate::cache::key::composite_key;
use crate::storage::ProviderResolver;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Number of checks in flight at once
pub const BATCH_SIZE: usize = 10;

/// One (artifact, context, version) triple of a batch request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchItem {
    pub artifact_id: String,
    pub context_id: String,
    pub version: Option<u32>,
}

impl BatchItem {
    pub fn new(
        artifact_id: impl Into<String>,
        context_id: impl Into<String>,
        version: Option<u32>,
    ) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            context_id: context_id.into(),
            version,
        }
    }

    /// Key of this item in the batch result map
    pub fn composite_key(&self) -> String {
        composite_key(&self.artifact_id, &self.context_id, self.version)
    }
}

impl<R: ProviderResolver> ArtifactCache<R> {
    /// Check many entries of one organization
    ///
    /// Items run in sequential waves of [`BATCH_SIZE`], each check of a wave
    /// on its own task. A failed or panicking check is `false` for its item
    /// only.
    pub async fn batch_exists(
        &self,
        organization_id: &str,
        items: &[BatchItem],
    ) -> HashMap<String, bool> {
        let mut results = HashMap::with_capacity(items.len());
        if items.is_empty() {
            return results;
        }

        let provider = match self.resolver.resolve(organization_id).await {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    organization_id,
                    error_type = e.error_type(),
                    items = items.len(),
                    "Batch existence check skipped, no storage provider: {}",
                    e
                );
                for item in items {
                    results.insert(item.composite_key(), false);
                }
                return results;
            }
        };

        for (wave, chunk) in items.chunks(BATCH_SIZE).enumerate() {
            let handles = chunk.iter().map(|item| {
                let provider = provider.clone();
                let entry = CacheEntryKey::new(
                    organization_id,
                    item.artifact_id.as_str(),
                    item.context_id.as_str(),
                    item.version,
                );
                tokio::spawn(async move { entry_exists(provider.as_ref(), &entry).await })
            });
            let outcomes = join_all(handles).await;

            for (item, outcome) in chunk.iter().zip(outcomes) {
                let key = item.composite_key();
                let exists = outcome.unwrap_or_else(|e| {
                    warn!(organization_id, key = %key, "Existence check aborted: {}", e);
                    false
                });
                results.insert(key, exists);
            }

            debug!(organization_id, wave, checks = chunk.len(), "Existence wave finished");
        }

        results
    }
}
