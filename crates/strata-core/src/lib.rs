//! Strata core - configuration values and errors shared by the storage crate.

pub mod config;
pub mod error;

pub use config::{
    DefaultStorageConfig, GcsConfig, LocalConfig, ProviderConfig, ProviderKind, R2Config,
    S3Config,
};
pub use error::{Error, Result};
