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

// Capability interface the router requires from every backend client

use super::health::NamespaceStats;
use crate::config::BackendKind;
use crate::error::StoreResult;
use crate::interaction::{InteractionRecord, QueryFilter};
use async_trait::async_trait;

/// Capability interface for a configured external store.
///
/// The router treats every backend uniformly through this trait; new
/// backend kinds are added by implementing it, not by branching on a
/// type tag inside the router. Implementations must be cheap to share
/// behind an `Arc` and must not hold router state.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Establish (or verify) the connection. Called once per descriptor
    /// at router construction; a failure marks the backend `Error` and
    /// is never fatal to the router.
    async fn connect(&self) -> StoreResult<()>;

    /// Liveness probe. `Ok(false)` means reachable-but-unhealthy.
    async fn ping(&self) -> StoreResult<bool>;

    /// Persist one interaction record.
    async fn insert(&self, record: &InteractionRecord) -> StoreResult<()>;

    /// Return up to `limit` records matching the filter, best-effort
    /// ordering. The router merges and re-sorts across backends.
    async fn find(&self, filter: &QueryFilter, limit: usize)
        -> StoreResult<Vec<InteractionRecord>>;

    /// Current size and item count of this backend's namespace.
    async fn stats(&self) -> StoreResult<NamespaceStats>;

    /// Adapter kind identifier.
    fn kind(&self) -> BackendKind;
}
