// Configuration module for interaction-store
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values matching the free-tier limits of typical hosted stores

pub mod types;
mod loader;

pub use loader::ConfigLoader;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Apply environment variable overrides to an already-loaded config
pub fn apply_env_overrides(config: &mut StoreConfig) {
    if let Ok(data_dir) = std::env::var("INTERACTION_DATA_DIR") {
        config.data_dir = data_dir;
    }

    if let Ok(uri) = std::env::var("DOCSTORE_URI") {
        if let Some(backend) = config
            .backends
            .iter_mut()
            .find(|b| b.kind == BackendKind::DocumentStore)
        {
            backend.uri = uri;
        }
    }

    if let Ok(token) = std::env::var("DOCSTORE_API_TOKEN") {
        if let Some(backend) = config
            .backends
            .iter_mut()
            .find(|b| b.kind == BackendKind::DocumentStore)
        {
            backend.api_token = Some(token);
        }
    }

    if let Ok(uri) = std::env::var("KVSTORE_URI") {
        if let Some(backend) = config
            .backends
            .iter_mut()
            .find(|b| b.kind == BackendKind::KeyValueStore)
        {
            backend.uri = uri;
        }
    }
}
