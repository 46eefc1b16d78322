//! Per-organization provider resolution
//!
//! An organization may bind its own storage integration. The credentials for
//! that integration live in a secret store as a JSON [`ProviderConfig`]. A
//! broken binding must never block the shared path, so every failure in the
//! override chain falls back to the default provider.

use super::{create_provider, default_provider, StorageProvider};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::sync::Arc;
use strata_core::{DefaultStorageConfig, ProviderConfig};
use tracing::{debug, info, warn};

/// Name of the secret holding the credentials of a storage integration
pub fn integration_secret_name(integration_id: &str) -> String {
    format!("s3-integration-{}", integration_id)
}

/// Organization → storage integration registry
#[async_trait]
pub trait IntegrationLookup: Send + Sync {
    /// Integration id bound to the organization, if any
    async fn lookup_integration(&self, organization_id: &str) -> Result<Option<String>>;
}

/// Secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn lookup_secret_by_name(&self, name: &str) -> Result<Option<String>>;
}

/// Anything that can turn an organization into a storage provider
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    async fn resolve(&self, organization_id: &str) -> Result<Arc<dyn StorageProvider>>;
}

#[async_trait]
impl<T: ProviderResolver + ?Sized> ProviderResolver for Arc<T> {
    async fn resolve(&self, organization_id: &str) -> Result<Arc<dyn StorageProvider>> {
        (**self).resolve(organization_id).await
    }
}

/// Resolves providers from integration bindings, with the default provider
/// as fallback
///
/// Nothing is cached: every call re-reads the binding and the secret.
pub struct CredentialResolver {
    integrations: Arc<dyn IntegrationLookup>,
    secrets: Arc<dyn SecretStore>,
    default_config: DefaultStorageConfig,
}

impl CredentialResolver {
    pub fn new(
        integrations: Arc<dyn IntegrationLookup>,
        secrets: Arc<dyn SecretStore>,
        default_config: DefaultStorageConfig,
    ) -> Self {
        Self {
            integrations,
            secrets,
            default_config,
        }
    }

    /// Shared fallback provider
    pub fn default_provider(&self) -> Result<Arc<dyn StorageProvider>> {
        default_provider(&self.default_config)
    }

    /// Provider for an organization, falling back to the default provider
    ///
    /// Only a failure to build the default provider is returned as an error.
    pub async fn resolve_provider_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Arc<dyn StorageProvider>> {
        match self.organization_override(organization_id).await {
            Ok(Some(provider)) => {
                info!(
                    organization_id,
                    provider = %provider.kind(),
                    bucket = %provider.bucket(),
                    "Using organization storage integration"
                );
                return Ok(provider);
            }
            Ok(None) => {
                debug!(organization_id, "No storage integration, using default provider");
            }
            Err(e) => {
                warn!(
                    organization_id,
                    error_type = e.error_type(),
                    "Failed to resolve organization storage, using default provider: {}",
                    e
                );
            }
        }

        self.default_provider()
    }

    async fn organization_override(
        &self,
        organization_id: &str,
    ) -> Result<Option<Arc<dyn StorageProvider>>> {
        let Some(integration_id) = self
            .integrations
            .lookup_integration(organization_id)
            .await
            .map_err(|e| resolution_error("integration lookup failed", e))?
        else {
            return Ok(None);
        };

        let secret_name = integration_secret_name(&integration_id);
        let secret = self
            .secrets
            .lookup_secret_by_name(&secret_name)
            .await
            .map_err(|e| resolution_error("secret lookup failed", e))?
            .ok_or_else(|| {
                StorageError::CredentialResolution(format!("secret '{}' not found", secret_name))
            })?;

        let config = ProviderConfig::from_json(&secret)
            .map_err(|e| resolution_error("invalid credentials payload", e))?;
        let provider = create_provider(&config)
            .map_err(|e| resolution_error("failed to build provider", e))?;

        Ok(Some(provider))
    }
}

fn resolution_error(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::CredentialResolution(format!("{}: {}", context, err))
}

#[async_trait]
impl ProviderResolver for CredentialResolver {
    async fn resolve(&self, organization_id: &str) -> Result<Arc<dyn StorageProvider>> {
        self.resolve_provider_for_organization(organization_id).await
    }
}
