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

// Document-store adapter over a JSON REST API

use super::adapter::StoreAdapter;
use super::health::NamespaceStats;
use crate::config::{BackendDescriptor, BackendKind};
use crate::error::{StoreError, StoreResult};
use crate::interaction::{InteractionRecord, QueryFilter};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Adapter for a document store exposing a JSON REST API.
///
/// Documents live in a named collection; inserts POST the record as-is
/// and queries filter on the indexed `user_id` / `group_id` fields,
/// sorted by timestamp descending server-side.
pub struct DocumentStoreAdapter {
    client: Client,
    base_url: String,
    collection: String,
}

#[derive(Debug, Deserialize)]
struct CollectionStats {
    size_bytes: u64,
    count: u64,
}

impl DocumentStoreAdapter {
    pub fn new(descriptor: &BackendDescriptor, timeout: Duration) -> Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout);

        // Add API token if provided
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
            collection: descriptor.namespace.clone(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/api/v1/collections/{}", self.base_url, self.collection)
    }

    /// Create the collection if it doesn't exist
    async fn ensure_collection(&self) -> Result<()> {
        let url = self.collection_url();

        match self.client.head(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Collection '{}' already exists", self.collection);
                Ok(())
            }
            _ => {
                info!("Creating collection '{}'", self.collection);
                let response = self
                    .client
                    .post(&url)
                    .send()
                    .await
                    .context("Failed to create collection")?;

                if response.status().is_success() || response.status().as_u16() == 409 {
                    info!("Collection '{}' created successfully", self.collection);
                    Ok(())
                } else {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    Err(anyhow!(
                        "Failed to create collection: {} - {}",
                        status,
                        error_text
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl StoreAdapter for DocumentStoreAdapter {
    async fn connect(&self) -> StoreResult<()> {
        self.ensure_collection()
            .await
            .map_err(StoreError::Connection)
    }

    async fn ping(&self) -> StoreResult<bool> {
        let url = format!("{}/api/v1/status", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("Document store ping failed with status: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Document store ping error: {}", e);
                Ok(false)
            }
        }
    }

    async fn insert(&self, record: &InteractionRecord) -> StoreResult<()> {
        let url = format!("{}/documents", self.collection_url());

        let response = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Write(anyhow!(e).context("Failed to send insert")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Write(anyhow!(
                "document insert failed with status {}: {}",
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
        let url = format!("{}/documents", self.collection_url());

        let (field, value) = match filter {
            QueryFilter::User(user_id) => ("user_id", user_id.as_str()),
            QueryFilter::Group(group_id) => ("group_id", group_id.as_str()),
        };

        let limit_param = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                (field, value),
                ("sort", "-timestamp"),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Read(anyhow!(e).context("Failed to send query")))?;

        if !response.status().is_success() {
            return Err(StoreError::Read(anyhow!(
                "document query failed with status {}",
                response.status()
            )));
        }

        let records: Vec<InteractionRecord> = response
            .json()
            .await
            .map_err(|e| StoreError::Read(anyhow!(e).context("Failed to decode documents")))?;

        Ok(records)
    }

    async fn stats(&self) -> StoreResult<NamespaceStats> {
        let url = format!("{}/stats", self.collection_url());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Read(anyhow!(e).context("Failed to fetch stats")))?;

        if !response.status().is_success() {
            return Err(StoreError::Read(anyhow!(
                "collection stats failed with status {}",
                response.status()
            )));
        }

        let stats: CollectionStats = response
            .json()
            .await
            .map_err(|e| StoreError::Read(anyhow!(e).context("Failed to decode stats")))?;

        Ok(NamespaceStats {
            size_mb: stats.size_bytes as f64 / (1024.0 * 1024.0),
            item_count: stats.count,
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }
}
