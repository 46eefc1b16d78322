//! Storage configuration values
//!
//! Two sources feed provider construction:
//! 1. Tenant credentials, stored as a JSON secret and parsed with
//!    [`ProviderConfig::from_json`] (cloud backends only)
//! 2. The shared default (R2) provider, read once from the process
//!    environment with [`DefaultStorageConfig::from_env`]

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Bucket used by the default provider when `R2_BUCKET` is unset
pub const DEFAULT_BUCKET: &str = "metric-exports";

const REDACTED: &str = "***";

// ============================================================================
// Provider configuration
// ============================================================================

/// Backend family discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    S3,
    R2,
    Gcs,
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::S3 => "s3",
            ProviderKind::R2 => "r2",
            ProviderKind::Gcs => "gcs",
            ProviderKind::Local => "local",
        }
    }

    const ALL: [ProviderKind; 4] = [
        ProviderKind::S3,
        ProviderKind::R2,
        ProviderKind::Gcs,
        ProviderKind::Local,
    ];

    /// Backends a tenant may bind through a credentials secret
    const TENANT: [ProviderKind; 3] = [ProviderKind::S3, ProviderKind::R2, ProviderKind::Gcs];
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AWS S3 (or any S3-compatible endpoint)
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint, defaults to `https://s3.{region}.amazonaws.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Cloudflare R2
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R2Config {
    pub account_id: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Google Cloud Storage
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsConfig {
    pub project_id: String,
    pub bucket: String,
    /// Service account key JSON, serialized as a string
    pub service_account_key: String,
}

/// Local filesystem, for development and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConfig {
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl fmt::Debug for R2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .finish()
    }
}

impl fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsConfig")
            .field("project_id", &self.project_id)
            .field("bucket", &self.bucket)
            .field("service_account_key", &REDACTED)
            .finish()
    }
}

/// Tagged storage configuration, serialized as `{"provider": "...", ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    S3(S3Config),
    R2(R2Config),
    Gcs(GcsConfig),
    Local(LocalConfig),
}

impl ProviderConfig {
    /// Parse a tenant credentials secret payload
    ///
    /// Only `s3`, `r2` and `gcs` are accepted. Any other tag, `local`
    /// included, is a configuration error rather than a generic JSON error.
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::parse_tagged(raw, &ProviderKind::TENANT)
    }

    /// Parse an operator-supplied config file, which may also select `local`
    pub fn from_trusted_json(raw: &str) -> Result<Self> {
        Self::parse_tagged(raw, &ProviderKind::ALL)
    }

    fn parse_tagged(raw: &str, allowed: &[ProviderKind]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        let tag = value
            .get("provider")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Config("Storage config is missing 'provider'".to_string()))?;

        if !allowed.iter().any(|k| k.as_str() == tag) {
            return Err(Error::Config(format!(
                "Unsupported storage provider: {}",
                tag
            )));
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::S3(_) => ProviderKind::S3,
            ProviderConfig::R2(_) => ProviderKind::R2,
            ProviderConfig::Gcs(_) => ProviderKind::Gcs,
            ProviderConfig::Local(_) => ProviderKind::Local,
        }
    }

    pub fn bucket(&self) -> &str {
        match self {
            ProviderConfig::S3(c) => &c.bucket,
            ProviderConfig::R2(c) => &c.bucket,
            ProviderConfig::Gcs(c) => &c.bucket,
            ProviderConfig::Local(c) => c.bucket.as_deref().unwrap_or("local"),
        }
    }

    /// Check required fields before a provider is built from this config
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::S3(c) => require(
                "s3",
                &[
                    ("region", &c.region),
                    ("bucket", &c.bucket),
                    ("accessKeyId", &c.access_key_id),
                    ("secretAccessKey", &c.secret_access_key),
                ],
            ),
            ProviderConfig::R2(c) => require(
                "r2",
                &[
                    ("accountId", &c.account_id),
                    ("bucket", &c.bucket),
                    ("accessKeyId", &c.access_key_id),
                    ("secretAccessKey", &c.secret_access_key),
                ],
            ),
            ProviderConfig::Gcs(c) => {
                require(
                    "gcs",
                    &[
                        ("projectId", &c.project_id),
                        ("bucket", &c.bucket),
                        ("serviceAccountKey", &c.service_account_key),
                    ],
                )?;
                match serde_json::from_str::<serde_json::Value>(&c.service_account_key) {
                    Ok(v) if v.is_object() => Ok(()),
                    Ok(_) => Err(Error::Config(
                        "Failed to parse GCS service account key: expected a JSON object"
                            .to_string(),
                    )),
                    Err(e) => Err(Error::Config(format!(
                        "Failed to parse GCS service account key: {}",
                        e
                    ))),
                }
            }
            ProviderConfig::Local(c) => {
                if c.root.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "local storage config requires 'root'".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn require(provider: &str, fields: &[(&str, &String)]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} storage config is missing required fields: {}",
            provider,
            missing.join(", ")
        )))
    }
}

// ============================================================================
// Default provider configuration
// ============================================================================

/// Shared fallback storage, built once at process start
#[derive(Clone, PartialEq)]
pub struct DefaultStorageConfig {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl fmt::Debug for DefaultStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultStorageConfig")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl DefaultStorageConfig {
    /// Load the default R2 credentials from the environment
    ///
    /// - R2_ACCOUNT_ID, R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY (required)
    /// - R2_BUCKET (optional, defaults to `metric-exports`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let (Some(account_id), Some(access_key_id), Some(secret_access_key)) = (
            get("R2_ACCOUNT_ID"),
            get("R2_ACCESS_KEY_ID"),
            get("R2_SECRET_ACCESS_KEY"),
        ) else {
            return Err(Error::Config(
                "Default R2 storage credentials not configured".to_string(),
            ));
        };

        Ok(Self {
            account_id,
            access_key_id,
            secret_access_key,
            bucket: get("R2_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        })
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::R2(R2Config {
            account_id: self.account_id.clone(),
            bucket: self.bucket.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        })
    }
}
