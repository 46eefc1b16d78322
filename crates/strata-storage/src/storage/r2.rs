//! Cloudflare R2 storage
//!
//! R2 speaks the S3 API, so it is an [`S3Provider`] pointed at the account
//! endpoint with the `auto` region.

use super::S3Provider;
use crate::error::Result;
use strata_core::{ProviderKind, R2Config};

const R2_REGION: &str = "auto";

/// S3 API endpoint for an R2 account
pub fn r2_endpoint(account_id: &str) -> String {
    format!("https://{}.r2.cloudflarestorage.com", account_id)
}

impl S3Provider {
    /// Create Cloudflare R2 storage from config
    pub fn new_r2(config: &R2Config) -> Result<Self> {
        Self::new_with_endpoint(
            ProviderKind::R2,
            &config.access_key_id,
            &config.secret_access_key,
            R2_REGION,
            &config.bucket,
            &r2_endpoint(&config.account_id),
        )
    }
}
