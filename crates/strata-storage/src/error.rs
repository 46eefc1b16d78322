//! Error types for strata storage
//!
//! Only [`StorageError::Configuration`] is meant to reach callers. The other
//! variants are produced at backend boundaries and downgraded by the provider
//! contract, the credential resolver, or the artifact cache.

use thiserror::Error;

/// Main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Unsupported provider, invalid parameters, or incomplete default config
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure talking to the physical backend
    #[error("Storage provider error: {0}")]
    Provider(String),

    /// Cached payload could not be decoded
    #[error("Corrupted cache entry: {0}")]
    Corruption(String),

    /// Failure anywhere in the per-organization credential chain
    #[error("Credential resolution failed: {0}")]
    CredentialResolution(String),
}

impl StorageError {
    /// Stable error type string, used as a structured log field
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Provider(_) => "provider_error",
            Self::Corruption(_) => "cache_corruption",
            Self::CredentialResolution(_) => "credential_resolution",
        }
    }

    /// Whether the error must surface instead of being degraded
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<strata_core::Error> for StorageError {
    fn from(err: strata_core::Error) -> Self {
        match err {
            strata_core::Error::Config(msg) => StorageError::Configuration(msg),
            other => StorageError::Configuration(other.to_string()),
        }
    }
}

impl From<s3::error::S3Error> for StorageError {
    fn from(err: s3::error::S3Error) -> Self {
        StorageError::Provider(err.to_string())
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        StorageError::Provider(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Corruption(err.to_string())
    }
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
