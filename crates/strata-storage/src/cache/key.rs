//! Versioned cache key scheme
//!
//! ```text
//! static-report-assets/{organization_id}/{artifact_id}-{context_id}.json      # legacy
//! static-report-assets/{organization_id}/{artifact_id}-{context_id}-v{N}.json # versioned
//! ```

/// Namespace segment for every cache object
pub const CACHE_PREFIX: &str = "static-report-assets";

/// Storage key for a cache entry
pub fn generate_key(
    organization_id: &str,
    artifact_id: &str,
    context_id: &str,
    version: Option<u32>,
) -> String {
    format!(
        "{}/{}/{}.json",
        CACHE_PREFIX,
        organization_id,
        composite_key(artifact_id, context_id, version)
    )
}

/// Unversioned storage key, only used as a lookup fallback
pub fn generate_legacy_key(organization_id: &str, artifact_id: &str, context_id: &str) -> String {
    generate_key(organization_id, artifact_id, context_id, None)
}

/// `{artifact_id}-{context_id}[-v{N}]`, also the batch result key
pub fn composite_key(artifact_id: &str, context_id: &str, version: Option<u32>) -> String {
    match version {
        Some(v) => format!("{}-{}-v{}", artifact_id, context_id, v),
        None => format!("{}-{}", artifact_id, context_id),
    }
}

/// Full identity of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheEntryKey {
    pub organization_id: String,
    pub artifact_id: String,
    pub context_id: String,
    pub version: Option<u32>,
}

impl CacheEntryKey {
    pub fn new(
        organization_id: impl Into<String>,
        artifact_id: impl Into<String>,
        context_id: impl Into<String>,
        version: Option<u32>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            artifact_id: artifact_id.into(),
            context_id: context_id.into(),
            version,
        }
    }

    pub fn storage_key(&self) -> String {
        generate_key(
            &self.organization_id,
            &self.artifact_id,
            &self.context_id,
            self.version,
        )
    }

    pub fn legacy_key(&self) -> String {
        generate_legacy_key(&self.organization_id, &self.artifact_id, &self.context_id)
    }

    /// Legacy key to fall back to after a miss, if the entry is versioned
    pub fn fallback_key(&self) -> Option<String> {
        self.version.map(|_| self.legacy_key())
    }
}
