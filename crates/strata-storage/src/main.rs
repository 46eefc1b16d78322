//! strata-check - storage credential check and cache key tool
//!
//! ```text
//! strata-check test <config.json>
//! strata-check test-default
//! strata-check key <organization> <artifact> <context> [version]
//! ```

use anyhow::{bail, Context};
use std::process::ExitCode;
use std::sync::Arc;
use strata_core::{DefaultStorageConfig, ProviderConfig};
use strata_storage::cache::generate_key;
use strata_storage::storage::{create_provider, default_provider, StorageProvider};
use tracing::info;

const USAGE: &str = "usage:
  strata-check test <config.json>
  strata-check test-default
  strata-check key <organization> <artifact> <context> [version]";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Set RUST_LOG_FORMAT=json for JSON output
    let use_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    if use_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["test", path] => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path))?;
            let config = ProviderConfig::from_trusted_json(&raw)?;
            let provider = create_provider(&config)?;
            check_connection(provider).await
        }
        ["test-default"] => {
            let config = DefaultStorageConfig::from_env()?;
            let provider = default_provider(&config)?;
            check_connection(provider).await
        }
        ["key", organization, artifact, context, rest @ ..] => {
            let version = match rest {
                [] => None,
                [v] => Some(
                    v.parse::<u32>()
                        .with_context(|| format!("Invalid version: {}", v))?,
                ),
                _ => bail!("{}", USAGE),
            };
            println!("{}", generate_key(organization, artifact, context, version));
            Ok(ExitCode::SUCCESS)
        }
        _ => bail!("{}", USAGE),
    }
}

async fn check_connection(provider: Arc<dyn StorageProvider>) -> anyhow::Result<ExitCode> {
    info!(
        provider = %provider.kind(),
        bucket = %provider.bucket(),
        "Testing storage connection"
    );

    let result = provider.test_connection().await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
