// Copyright 2025 interaction-store contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for interaction-store

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Configured backends, ordered by priority (lower = preferred)
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendDescriptor>,

    /// Automatically re-select the active backend after a write failure
    #[serde(default = "default_true")]
    pub auto_failover: bool,

    /// When false, `record` becomes a no-op
    #[serde(default = "default_true")]
    pub learning_enabled: bool,

    /// Directory for the file fallback and persisted health stats
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Bound on every backend call; a timeout counts as a backend error
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            auto_failover: default_true(),
            learning_enabled: default_true(),
            data_dir: default_data_dir(),
            call_timeout_seconds: default_call_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

/// Backend kind, one variant per adapter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    DocumentStore,
    KeyValueStore,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::DocumentStore => "document_store",
            BackendKind::KeyValueStore => "key_value_store",
        }
    }
}

/// One configured backend. Immutable after load.
///
/// An empty `uri` disables the descriptor: it is skipped at connect
/// time and never treated as a startup failure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    pub uri: String,

    /// Lower value = preferred
    pub priority: u32,

    /// Backends at or over this size are skipped during selection
    #[serde(default = "default_size_limit")]
    pub size_limit_mb: f64,

    /// Collection name (document store) or key prefix (key-value store)
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub api_token: Option<String>,

    /// Record expiry for TTL-capable backends
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,
}

impl BackendDescriptor {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_days) * 24 * 60 * 60)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_backends() -> Vec<BackendDescriptor> {
    vec![
        BackendDescriptor {
            name: "primary_docstore".to_string(),
            kind: BackendKind::DocumentStore,
            uri: "http://localhost:8080".to_string(),
            priority: 1,
            size_limit_mb: 500.0,
            namespace: "user_interactions".to_string(),
            api_token: None,
            ttl_days: default_ttl_days(),
        },
        BackendDescriptor {
            name: "secondary_docstore".to_string(),
            kind: BackendKind::DocumentStore,
            // Disabled until a URI is configured
            uri: String::new(),
            priority: 2,
            size_limit_mb: 500.0,
            namespace: "user_interactions".to_string(),
            api_token: None,
            ttl_days: default_ttl_days(),
        },
        BackendDescriptor {
            name: "kv_cache".to_string(),
            kind: BackendKind::KeyValueStore,
            uri: "http://localhost:7379".to_string(),
            priority: 3,
            size_limit_mb: 30.0,
            namespace: "interaction".to_string(),
            api_token: None,
            ttl_days: default_ttl_days(),
        },
    ]
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_call_timeout() -> u64 {
    10
}
fn default_size_limit() -> f64 {
    500.0
}
fn default_namespace() -> String {
    "user_interactions".to_string()
}
fn default_ttl_days() -> u32 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
