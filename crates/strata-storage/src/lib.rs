//! Strata storage - multi-tenant object storage and a versioned artifact cache
//!
//! Organizations either bring their own bucket (S3, R2 or GCS) through a
//! storage integration or share the default R2 bucket. Query results are
//! cached as JSON artifacts under versioned keys in whichever bucket the
//! organization resolves to.

pub mod cache;
pub mod error;
pub mod storage;

pub use cache::{ArtifactCache, BatchItem, CacheableArtifact, MetricData};
pub use error::{Result, StorageError};
pub use storage::{
    create_provider, default_provider, test_credentials, CredentialResolver, ProviderResolver,
    StorageProvider,
};
