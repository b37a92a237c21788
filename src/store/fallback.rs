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

// Durable file fallback: one JSON array per user, bounded length

use crate::error::{StoreError, StoreResult};
use crate::interaction::{InteractionRecord, QueryFilter};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Records kept per user file; oldest are dropped first on overflow
pub const MAX_RECORDS_PER_USER: usize = 100;

/// Local durable storage used when no configured backend qualifies.
///
/// Every write rewrites the user's whole file truncated to the last
/// [`MAX_RECORDS_PER_USER`] entries. Full-file rewrite is fine at this
/// record volume and keeps the files trivially inspectable.
pub struct FileFallback {
    interactions_dir: PathBuf,
}

/// Restrict user ids to path-safe characters
fn sanitize_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl FileFallback {
    pub fn new(data_dir: &Path) -> StoreResult<Self> {
        let interactions_dir = data_dir.join("interactions");
        std::fs::create_dir_all(&interactions_dir)?;

        info!(
            "Initialized file fallback at: {}",
            interactions_dir.display()
        );

        Ok(Self { interactions_dir })
    }

    fn user_file(&self, user_id: &str) -> PathBuf {
        self.interactions_dir
            .join(format!("{}.json", sanitize_user_id(user_id)))
    }

    async fn load_user_records(&self, user_id: &str) -> Vec<InteractionRecord> {
        let path = self.user_file(user_id);
        match fs::read(&path).await {
            Ok(content) => match serde_json::from_slice(&content) {
                Ok(records) => records,
                Err(e) => {
                    // Start fresh rather than lose the new record
                    warn!(path = %path.display(), error = %e, "discarding unreadable fallback file");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    /// Append a record to the owning user's file, truncating to the
    /// most recent [`MAX_RECORDS_PER_USER`] entries.
    pub async fn append(&self, record: &InteractionRecord) -> StoreResult<()> {
        let mut records = self.load_user_records(&record.user_id).await;
        records.push(record.clone());

        if records.len() > MAX_RECORDS_PER_USER {
            let drop = records.len() - MAX_RECORDS_PER_USER;
            records.drain(..drop);
        }

        let path = self.user_file(&record.user_id);
        let content = serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::FileIo(std::io::Error::other(e)))?;

        fs::write(&path, content).await?;

        debug!(
            "Wrote {} fallback records to {}",
            records.len(),
            path.display()
        );

        Ok(())
    }

    /// Return up to `limit` matching records, newest first.
    pub async fn find(
        &self,
        filter: &QueryFilter,
        limit: usize,
    ) -> StoreResult<Vec<InteractionRecord>> {
        match filter {
            QueryFilter::User(user_id) => {
                let mut records = self.load_user_records(user_id).await;
                // Sanitization can map distinct user ids onto the same
                // file, so match on the stored id, not the file name
                records.retain(|r| filter.matches(r));
                // Files are append-ordered, so the tail is the newest
                let skip = records.len().saturating_sub(limit);
                records.drain(..skip);
                records.reverse();
                Ok(records)
            }
            QueryFilter::Group(_) => {
                // Files are keyed by user, so group lookups scan them all
                let mut matches = Vec::new();
                let mut entries = fs::read_dir(&self.interactions_dir).await?;

                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                        continue;
                    }
                    let content = match fs::read(&path).await {
                        Ok(content) => content,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping unreadable fallback file");
                            continue;
                        }
                    };
                    let records: Vec<InteractionRecord> = match serde_json::from_slice(&content) {
                        Ok(records) => records,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping undecodable fallback file");
                            continue;
                        }
                    };
                    matches.extend(records.into_iter().filter(|r| filter.matches(r)));
                }

                matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                matches.truncate(limit);
                Ok(matches)
            }
        }
    }

    /// Verify the fallback directory is writable.
    pub async fn health_check(&self) -> bool {
        let test_file = self.interactions_dir.join(".health_check_test");
        match fs::write(&test_file, b"test").await {
            Ok(()) => {
                let _ = fs::remove_file(&test_file).await;
                true
            }
            Err(e) => {
                warn!("Fallback health check failed - cannot write: {}", e);
                false
            }
        }
    }
}
