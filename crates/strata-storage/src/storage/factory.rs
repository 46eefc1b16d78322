//! Provider construction from configuration values

use super::{GcsProvider, LocalProvider, S3Provider, StorageProvider};
use crate::error::Result;
use std::sync::Arc;
use strata_core::{DefaultStorageConfig, ProviderConfig};
use tracing::{debug, warn};

/// Create a storage backend from a provider config
///
/// Invalid configuration is a [`StorageError::Configuration`] and is never
/// downgraded here.
///
/// [`StorageError::Configuration`]: crate::error::StorageError::Configuration
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn StorageProvider>> {
    config.validate()?;

    let provider: Arc<dyn StorageProvider> = match config {
        ProviderConfig::S3(cfg) => Arc::new(S3Provider::new_s3(cfg)?),
        ProviderConfig::R2(cfg) => Arc::new(S3Provider::new_r2(cfg)?),
        ProviderConfig::Gcs(cfg) => Arc::new(GcsProvider::new(cfg)?),
        ProviderConfig::Local(cfg) => Arc::new(LocalProvider::new(cfg)),
    };

    debug!(
        provider = %provider.kind(),
        bucket = %provider.bucket(),
        "Storage provider created"
    );
    Ok(provider)
}

/// Create the shared fallback provider
pub fn default_provider(config: &DefaultStorageConfig) -> Result<Arc<dyn StorageProvider>> {
    create_provider(&config.to_provider_config())
}

/// Validate candidate credentials with a full write / read / delete check
///
/// Any failure, including one while building the provider, is `false`.
pub async fn test_credentials(config: &ProviderConfig) -> bool {
    let provider = match create_provider(config) {
        Ok(provider) => provider,
        Err(e) => {
            warn!(
                provider = %config.kind(),
                error_type = e.error_type(),
                "Storage credential test failed to build provider: {}",
                e
            );
            return false;
        }
    };

    let result = provider.test_connection().await;
    if !result.success {
        warn!(
            provider = %config.kind(),
            bucket = %config.bucket(),
            can_write = result.can_write,
            can_read = result.can_read,
            can_delete = result.can_delete,
            "Storage credential test failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    result.success
}

/// Validate a tenant-supplied credentials payload before it is stored
///
/// The payload goes through [`ProviderConfig::from_json`], so only cloud
/// backends can pass.
pub async fn test_credentials_json(raw: &str) -> bool {
    match ProviderConfig::from_json(raw) {
        Ok(config) => test_credentials(&config).await,
        Err(e) => {
            warn!("Storage credential test rejected payload: {}", e);
            false
        }
    }
}
