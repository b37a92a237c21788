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

// Key-value store adapter over a Redis-style REST command API

use super::adapter::StoreAdapter;
use super::health::NamespaceStats;
use crate::config::{BackendDescriptor, BackendKind};
use crate::error::{StoreError, StoreResult};
use crate::interaction::{InteractionRecord, QueryFilter};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Adapter for a key-value store reachable through a Redis-style REST
/// command path (`GET {base}/keys/{pattern}`, `POST {base}/set/{key}`).
///
/// Records are stored as JSON strings under TTL'd keys of the form
/// `{prefix}:{user_id}:{yyyymmddHHMMSS}:{suffix}`, so lexicographic key
/// order is chronological and expiry bounds store growth. Lookups
/// enumerate keys by pattern; that scan is O(total keys) and not
/// indexed, an accepted inefficiency at this record volume.
pub struct KeyValueStoreAdapter {
    client: Client,
    base_url: String,
    key_prefix: String,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct Reply<T> {
    result: T,
}

/// Build the storage key for a record. Seconds-precision timestamps can
/// collide within one second; the random suffix keeps keys unique (at
/// the cost of arbitrary ordering inside that second).
pub fn interaction_key(prefix: &str, user_id: &str, timestamp_compact: &str, suffix: &str) -> String {
    format!("{}:{}:{}:{}", prefix, user_id, timestamp_compact, suffix)
}

/// Extract `used_memory` from a Redis `INFO memory` text blob
pub fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|v| v.trim().parse().ok())
}

impl KeyValueStoreAdapter {
    pub fn new(descriptor: &BackendDescriptor, timeout: Duration) -> Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout);

        if let Some(token) = &descriptor.api_token {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_value).context("Invalid API token")?,
            );
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: descriptor.uri.trim_end_matches('/').to_string(),
            key_prefix: descriptor.namespace.clone(),
            ttl: descriptor.ttl(),
        })
    }

    async fn command<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send command '{}'", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("command failed with status {}: {}", status, error_text));
        }

        let reply: Reply<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode reply for '{}'", path))?;
        Ok(reply.result)
    }

    async fn fetch_record(&self, key: &str) -> Result<Option<InteractionRecord>> {
        let value: Option<String> = self.command(&format!("get/{}", key)).await?;
        match value {
            // Key may have expired between the scan and the fetch
            None => Ok(None),
            Some(json) => match serde_json::from_str(&json) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(key, error = %e, "skipping undecodable key-value record");
                    Ok(None)
                }
            },
        }
    }

    /// Enumerate keys matching the pattern, newest first.
    async fn keys_desc(&self, pattern: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.command(&format!("keys/{}", pattern)).await?;
        keys.sort_by(|a, b| b.cmp(a));
        Ok(keys)
    }
}

#[async_trait]
impl StoreAdapter for KeyValueStoreAdapter {
    async fn connect(&self) -> StoreResult<()> {
        let pong: String = self
            .command("ping")
            .await
            .map_err(StoreError::Connection)?;

        if pong.eq_ignore_ascii_case("pong") {
            Ok(())
        } else {
            Err(StoreError::Connection(anyhow!(
                "unexpected ping reply: {}",
                pong
            )))
        }
    }

    async fn ping(&self) -> StoreResult<bool> {
        match self.command::<String>("ping").await {
            Ok(pong) => Ok(pong.eq_ignore_ascii_case("pong")),
            Err(e) => {
                warn!("Key-value store ping error: {}", e);
                Ok(false)
            }
        }
    }

    async fn insert(&self, record: &InteractionRecord) -> StoreResult<()> {
        let timestamp_compact = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let suffix = Uuid::new_v4().simple().to_string()[..6].to_string();
        let key = interaction_key(&self.key_prefix, &record.user_id, &timestamp_compact, &suffix);

        let body = serde_json::to_string(record)
            .map_err(|e| StoreError::Write(anyhow!(e).context("Failed to serialize record")))?;

        let url = format!("{}/set/{}?EX={}", self.base_url, key, self.ttl.as_secs());
        let response = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Write(anyhow!(e).context("Failed to send set")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Write(anyhow!(
                "key-value set failed with status {}: {}",
                status,
                error_text
            )));
        }

        Ok(())
    }

    async fn find(
        &self,
        filter: &QueryFilter,
        limit: usize,
    ) -> StoreResult<Vec<InteractionRecord>> {
        let mut records = Vec::new();

        match filter {
            QueryFilter::User(user_id) => {
                let pattern = format!("{}:{}:*", self.key_prefix, user_id);
                let keys = self.keys_desc(&pattern).await.map_err(StoreError::Read)?;

                // Keys can expire between the scan and the fetch, so
                // keep going past misses until the limit is filled
                for key in keys {
                    if records.len() >= limit {
                        break;
                    }
                    if let Some(record) = self
                        .fetch_record(&key)
                        .await
                        .map_err(StoreError::Read)?
                    {
                        records.push(record);
                    }
                }
            }
            QueryFilter::Group(_) => {
                // No per-group key schema: scan every interaction key
                // and filter. O(total keys), documented tradeoff.
                let pattern = format!("{}:*", self.key_prefix);
                let keys = self.keys_desc(&pattern).await.map_err(StoreError::Read)?;

                for key in keys {
                    if records.len() >= limit {
                        break;
                    }
                    if let Some(record) = self
                        .fetch_record(&key)
                        .await
                        .map_err(StoreError::Read)?
                    {
                        if filter.matches(&record) {
                            records.push(record);
                        }
                    }
                }
            }
        }

        Ok(records)
    }

    async fn stats(&self) -> StoreResult<NamespaceStats> {
        let info: String = self
            .command("info/memory")
            .await
            .map_err(StoreError::Read)?;
        let used_memory = parse_used_memory(&info)
            .ok_or_else(|| StoreError::Read(anyhow!("no used_memory in info reply")))?;

        let item_count: u64 = self.command("dbsize").await.map_err(StoreError::Read)?;

        Ok(NamespaceStats {
            size_mb: used_memory as f64 / (1024.0 * 1024.0),
            item_count,
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::KeyValueStore
    }
}
