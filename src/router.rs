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

// StoreRouter: active-backend selection, failover, and the uniform
// record/query surface over heterogeneous backends

use crate::config::{BackendDescriptor, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::interaction::{InteractionRecord, QueryFilter};
use crate::store::health::NamespaceStats;
use crate::store::{
    AdapterFactory, BackendHealth, BackendStatus, FileFallback, HealthLedger, StoreAdapter,
};
use anyhow::anyhow;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sentinel name reported while the file fallback is active
pub const FILE_FALLBACK_NAME: &str = "file_storage";

/// Router construction options, independent of the config file format
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub data_dir: PathBuf,
    pub auto_failover: bool,
    pub learning_enabled: bool,
    pub call_timeout: Duration,
}

impl RouterOptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            auto_failover: true,
            learning_enabled: true,
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&StoreConfig> for RouterOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            data_dir: PathBuf::from(&config.data_dir),
            auto_failover: config.auto_failover,
            learning_enabled: config.learning_enabled,
            call_timeout: config.call_timeout(),
        }
    }
}

struct RegisteredBackend {
    descriptor: BackendDescriptor,
    /// `None` for descriptors that were skipped (empty URI or invalid
    /// configuration); they keep a health entry but are never selected.
    adapter: Option<Arc<dyn StoreAdapter>>,
}

/// Routes interaction records to the healthiest configured backend.
///
/// Exactly one backend (or the file fallback) receives writes at any
/// time; reads fan out to every connected backend plus the fallback
/// and merge. All backend failures are absorbed: `record` never
/// returns an error to the caller.
///
/// The router is single-owner: methods take `&mut self` and each call
/// runs to completion before the next. A concurrent host must wrap the
/// router in a single mutex, since failover decisions read-then-write
/// health state non-atomically.
pub struct StoreRouter {
    backends: Vec<RegisteredBackend>,
    health: HealthLedger,
    fallback: FileFallback,
    active: Option<String>,
    auto_failover: bool,
    learning_enabled: bool,
    call_timeout: Duration,
}

/// Bound a backend call; a timeout is indistinguishable from an
/// unreachable backend for failover purposes.
async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Connection(anyhow!(
            "backend call timed out after {:?}",
            limit
        ))),
    }
}

impl StoreRouter {
    /// Build the router from configuration, creating one adapter per
    /// usable descriptor. A backend that fails to connect is marked
    /// `Error` and skipped; only an unusable data directory is fatal.
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let mut entries = Vec::new();

        for descriptor in &config.backends {
            if descriptor.uri.is_empty() {
                info!(backend = %descriptor.name, "skipping backend with empty URI");
                entries.push((descriptor.clone(), None));
                continue;
            }

            match AdapterFactory::create(descriptor, config.call_timeout()) {
                Ok(adapter) => entries.push((descriptor.clone(), Some(adapter))),
                Err(e) => {
                    warn!(backend = %descriptor.name, error = %e, "skipping misconfigured backend");
                    entries.push((descriptor.clone(), None));
                }
            }
        }

        Self::with_backends(RouterOptions::from(config), entries).await
    }

    /// Build the router from pre-constructed adapters. This is the
    /// injection point for hosts that manage their own clients and for
    /// tests.
    pub async fn with_backends(
        options: RouterOptions,
        entries: Vec<(BackendDescriptor, Option<Arc<dyn StoreAdapter>>)>,
    ) -> StoreResult<Self> {
        let fallback = FileFallback::new(&options.data_dir)?;
        if !fallback.health_check().await {
            warn!("file fallback directory is not writable, records may be lost");
        }

        let health = HealthLedger::load(
            options.data_dir.join("backend_stats.json"),
            entries.iter().map(|(d, _)| d.name.as_str()),
        );

        let backends = entries
            .into_iter()
            .map(|(descriptor, adapter)| RegisteredBackend {
                descriptor,
                adapter,
            })
            .collect();

        let mut router = Self {
            backends,
            health,
            fallback,
            active: None,
            auto_failover: options.auto_failover,
            learning_enabled: options.learning_enabled,
            call_timeout: options.call_timeout,
        };

        router.connect_all().await;
        router.select_active_backend();
        router.health.persist();

        Ok(router)
    }

    /// Attempt a connection to every backend that has an adapter. A
    /// single backend's failure is never fatal.
    async fn connect_all(&mut self) {
        for i in 0..self.backends.len() {
            let Some(adapter) = self.backends[i].adapter.clone() else {
                continue;
            };
            let name = self.backends[i].descriptor.name.clone();

            match bounded(self.call_timeout, adapter.connect()).await {
                Ok(()) => {
                    let stats = bounded(self.call_timeout, adapter.stats())
                        .await
                        .unwrap_or_else(|e| {
                            warn!(backend = %name, error = %e, "initial stats probe failed");
                            NamespaceStats::default()
                        });
                    self.health.get_mut(&name).mark_connected(stats);
                    info!(backend = %name, "connected");
                }
                Err(e) => {
                    warn!(backend = %name, error = %e, "failed to connect");
                    self.health.get_mut(&name).mark_error(&e);
                }
            }
        }
    }

    fn adapter_of(&self, name: &str) -> Option<Arc<dyn StoreAdapter>> {
        self.backends
            .iter()
            .find(|b| b.descriptor.name == name)
            .and_then(|b| b.adapter.clone())
    }

    /// Re-select the active backend: the connected backend with the
    /// lowest priority value whose size is under its limit. A pure
    /// function of current health state; run after every health change.
    pub fn select_active_backend(&mut self) {
        let mut candidates: Vec<(u32, String, f64)> = self
            .backends
            .iter()
            .filter(|b| b.adapter.is_some())
            .map(|b| {
                (
                    b.descriptor.priority,
                    b.descriptor.name.clone(),
                    b.descriptor.size_limit_mb,
                )
            })
            .collect();
        candidates.sort_by_key(|(priority, _, _)| *priority);

        for (_, name, size_limit_mb) in candidates {
            if self.health.status_of(&name) != BackendStatus::Connected {
                continue;
            }
            let size_mb = self.health.get(&name).map(|h| h.size_mb).unwrap_or(0.0);
            if size_mb < size_limit_mb {
                if self.active.as_deref() != Some(name.as_str()) {
                    info!(backend = %name, "selected active backend");
                }
                self.active = Some(name);
                return;
            }
        }

        if self.active.is_some() {
            warn!("no backend available, falling back to file storage");
        }
        self.active = None;
    }

    async fn try_insert(&mut self, name: &str, record: &InteractionRecord) -> StoreResult<()> {
        let adapter = self
            .adapter_of(name)
            .ok_or_else(|| StoreError::NotConnected(name.to_string()))?;

        bounded(self.call_timeout, adapter.insert(record)).await?;

        // Refresh size/count after a successful write; a failed probe
        // does not undo the write's success.
        match bounded(self.call_timeout, adapter.stats()).await {
            Ok(stats) => self.health.get_mut(name).mark_connected(stats),
            Err(e) => {
                warn!(backend = %name, error = %e, "stats refresh failed after write");
                self.health.get_mut(name).touch();
            }
        }
        self.health.persist();

        Ok(())
    }

    fn note_failure(&mut self, name: &str, error: &StoreError) {
        self.health.get_mut(name).mark_error(error);
        self.health.persist();
    }

    /// Persist one interaction. Never returns an error: every backend
    /// failure triggers at most one failover retry, then the file
    /// fallback absorbs the record. Only a fallback I/O failure loses
    /// it, and that is logged.
    pub async fn record(&mut self, record: InteractionRecord) {
        if !self.learning_enabled {
            debug!("learning disabled, dropping record");
            return;
        }

        if let Some(active) = self.active.clone() {
            match self.try_insert(&active, &record).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(backend = %active, error = %e, "write failed on active backend");
                    self.note_failure(&active, &e);

                    if self.auto_failover {
                        self.select_active_backend();
                        if let Some(next) = self.active.clone() {
                            // One retry only, to avoid cascading retries
                            // during a cluster-wide outage
                            match self.try_insert(&next, &record).await {
                                Ok(()) => return,
                                Err(e) => {
                                    warn!(backend = %next, error = %e, "failover write failed");
                                    self.note_failure(&next, &e);
                                    self.select_active_backend();
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Err(e) = self.fallback.append(&record).await {
            error!(user_id = %record.user_id, error = %e, "file fallback write failed, record dropped");
        }
    }

    /// Most recent interactions for a user, newest first.
    pub async fn query(&self, user_id: &str, limit: usize) -> Vec<InteractionRecord> {
        self.fan_out(QueryFilter::User(user_id.to_string()), limit)
            .await
    }

    /// Most recent interactions in a group chat, newest first.
    pub async fn query_group(&self, group_id: &str, limit: usize) -> Vec<InteractionRecord> {
        self.fan_out(QueryFilter::Group(group_id.to_string()), limit)
            .await
    }

    /// Fan out to every connected backend plus the fallback, merge and
    /// re-sort. A failing backend only costs its partial results.
    async fn fan_out(&self, filter: QueryFilter, limit: usize) -> Vec<InteractionRecord> {
        let mut merged = Vec::new();

        for backend in &self.backends {
            let Some(adapter) = backend.adapter.clone() else {
                continue;
            };
            let name = &backend.descriptor.name;
            if self.health.status_of(name) != BackendStatus::Connected {
                continue;
            }

            match bounded(self.call_timeout, adapter.find(&filter, limit)).await {
                Ok(records) => merged.extend(records),
                Err(e) => {
                    warn!(backend = %name, error = %e, "query failed, omitting this backend's results")
                }
            }
        }

        match self.fallback.find(&filter, limit).await {
            Ok(records) => merged.extend(records),
            Err(e) => warn!(error = %e, "fallback query failed"),
        }

        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged.truncate(limit);
        merged
    }

    /// Re-probe every backend and return fresh health records.
    ///
    /// Connected backends get a stats probe; backends in `Error` or
    /// `Unknown` state get a ping first, a successful ping being the
    /// only path back to `Connected`.
    pub async fn get_stats(&mut self) -> HashMap<String, BackendHealth> {
        for i in 0..self.backends.len() {
            let Some(adapter) = self.backends[i].adapter.clone() else {
                continue;
            };
            let name = self.backends[i].descriptor.name.clone();

            match self.health.status_of(&name) {
                BackendStatus::Connected => {
                    match bounded(self.call_timeout, adapter.stats()).await {
                        Ok(stats) => self.health.get_mut(&name).mark_connected(stats),
                        Err(e) => {
                            warn!(backend = %name, error = %e, "stats probe failed");
                            self.health.get_mut(&name).mark_error(&e);
                        }
                    }
                }
                BackendStatus::Unknown | BackendStatus::Error => {
                    match bounded(self.call_timeout, adapter.ping()).await {
                        Ok(true) => {
                            let stats = bounded(self.call_timeout, adapter.stats())
                                .await
                                .unwrap_or_default();
                            self.health.get_mut(&name).mark_connected(stats);
                            info!(backend = %name, "backend recovered");
                        }
                        _ => self.health.get_mut(&name).touch(),
                    }
                }
            }
        }

        self.health.persist();
        self.health.snapshot()
    }

    /// Operator override: make `name` the active backend, bypassing the
    /// priority and size checks. The target must be connected.
    pub fn switch_active_backend(&mut self, name: &str) -> StoreResult<()> {
        let backend = self
            .backends
            .iter()
            .find(|b| b.descriptor.name == name)
            .ok_or_else(|| StoreError::UnknownBackend(name.to_string()))?;

        if backend.adapter.is_none() || self.health.status_of(name) != BackendStatus::Connected {
            return Err(StoreError::NotConnected(name.to_string()));
        }

        info!(backend = %name, "active backend switched by operator");
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Name of the backend currently receiving writes, or the
    /// [`FILE_FALLBACK_NAME`] sentinel in fallback mode.
    pub fn active_backend_name(&self) -> &str {
        self.active.as_deref().unwrap_or(FILE_FALLBACK_NAME)
    }

    pub fn using_file_fallback(&self) -> bool {
        self.active.is_none()
    }
}
