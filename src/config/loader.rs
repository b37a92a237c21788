// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        // Substitute environment variables
        let content = Self::substitute_env_vars(&content);

        // Parse YAML
        let config: StoreConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Write the configuration back to disk. The config document stays
    /// editable at runtime (descriptors can be added by admin tooling).
    pub fn save<P: AsRef<Path>>(config: &StoreConfig, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(config).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write config file")?;
        Ok(())
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${DOCSTORE_URI:-http://localhost:8080} -> http://localhost:8080 (if DOCSTORE_URI not set)
    fn substitute_env_vars(content: &str) -> String {
        // An empty default (`${VAR:-}`) is meaningful: it disables a
        // backend descriptor when the variable is unset.
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        // Keep original if no default and var not found
                        format!("${{{}}}", var_name)
                    }
                }
            }
        })
        .to_string()
    }

    /// Validate configuration
    ///
    /// An empty backend URI is deliberately allowed: it marks the
    /// descriptor as disabled and the router skips it at connect time.
    pub(crate) fn validate(config: &StoreConfig) -> Result<()> {
        if config.call_timeout_seconds == 0 {
            bail!("call_timeout_seconds must be > 0");
        }

        if config.data_dir.is_empty() {
            bail!("data_dir cannot be empty");
        }

        let mut seen = HashSet::new();
        for backend in &config.backends {
            if backend.name.is_empty() {
                bail!("backend name cannot be empty");
            }

            if !seen.insert(backend.name.as_str()) {
                bail!("duplicate backend name: '{}'", backend.name);
            }

            if backend.size_limit_mb <= 0.0 {
                bail!(
                    "backend '{}': size_limit_mb must be > 0",
                    backend.name
                );
            }

            if backend.namespace.is_empty() {
                bail!("backend '{}': namespace cannot be empty", backend.name);
            }

            if backend.kind == BackendKind::KeyValueStore && backend.ttl_days == 0 {
                bail!("backend '{}': ttl_days must be > 0", backend.name);
            }
        }

        Ok(())
    }
}
