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

// Per-backend health bookkeeping and its on-disk persistence

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, warn};

/// Size and item count reported by a backend for its namespace
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NamespaceStats {
    pub size_mb: f64,
    pub item_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Unknown,
    Connected,
    Error,
}

/// Mutable health record for one backend, updated after every connect
/// attempt, probe and write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: BackendStatus,
    pub size_mb: f64,
    pub item_count: u64,
    pub last_checked: String,
    pub error_count: u64,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl BackendHealth {
    pub fn unknown() -> Self {
        Self {
            status: BackendStatus::Unknown,
            size_mb: 0.0,
            item_count: 0,
            last_checked: Utc::now().to_rfc3339(),
            error_count: 0,
            last_error: None,
        }
    }

    /// Record a successful connect or probe. Error history is kept.
    pub fn mark_connected(&mut self, stats: NamespaceStats) {
        self.status = BackendStatus::Connected;
        self.size_mb = stats.size_mb;
        self.item_count = stats.item_count;
        self.last_checked = Utc::now().to_rfc3339();
    }

    pub fn mark_error(&mut self, error: impl ToString) {
        self.status = BackendStatus::Error;
        self.error_count += 1;
        self.last_error = Some(error.to_string());
        self.last_checked = Utc::now().to_rfc3339();
    }

    /// Refresh the check timestamp without changing status
    pub fn touch(&mut self) {
        self.last_checked = Utc::now().to_rfc3339();
    }
}

/// Health records for all configured backends, persisted as a single
/// JSON document so error history survives restarts. Persistence is
/// best-effort: a failed write is logged and never fails an operation.
#[derive(Debug)]
pub struct HealthLedger {
    path: PathBuf,
    entries: HashMap<String, BackendHealth>,
}

impl HealthLedger {
    /// Load the ledger from disk, seeding an `Unknown` entry for every
    /// configured backend name that has no persisted record yet.
    pub fn load<'a>(path: PathBuf, backend_names: impl Iterator<Item = &'a str>) -> Self {
        let mut entries: HashMap<String, BackendHealth> = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable health stats file");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        for name in backend_names {
            entries
                .entry(name.to_string())
                .or_insert_with(BackendHealth::unknown);
        }

        Self { path, entries }
    }

    pub fn status_of(&self, name: &str) -> BackendStatus {
        self.entries
            .get(name)
            .map(|h| h.status)
            .unwrap_or(BackendStatus::Unknown)
    }

    pub fn get(&self, name: &str) -> Option<&BackendHealth> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> &mut BackendHealth {
        self.entries
            .entry(name.to_string())
            .or_insert_with(BackendHealth::unknown)
    }

    pub fn snapshot(&self) -> HashMap<String, BackendHealth> {
        self.entries.clone()
    }

    /// Rewrite the stats document. Called after every status change.
    pub fn persist(&self) {
        let content = match serde_json::to_string_pretty(&self.entries) {
            Ok(content) => content,
            Err(e) => {
                error!(error = %e, "failed to serialize health stats");
                return;
            }
        };

        if let Err(e) = std::fs::write(&self.path, content) {
            error!(path = %self.path.display(), error = %e, "failed to persist health stats");
        }
    }
}
