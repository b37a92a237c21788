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

// Multi-backend persistence router for chat-interaction records:
// - Routes writes to the healthiest configured backend by priority
// - Tracks per-backend health/size and persists it across restarts
// - Fails over automatically on write failure, at most once per call
// - Falls back to durable per-user JSON files when no backend qualifies
// - Merges reads across all connected backends plus the fallback

pub mod config;
pub mod error;
pub mod interaction;
pub mod router;
pub mod store;

// Re-export main types
pub use config::{
    load_config, load_config_with_env, BackendDescriptor, BackendKind, ConfigLoader, StoreConfig,
};
pub use error::{StoreError, StoreResult};
pub use interaction::{ChatContext, InteractionRecord, QueryFilter};
pub use router::{RouterOptions, StoreRouter, FILE_FALLBACK_NAME};
pub use store::{
    AdapterFactory, BackendHealth, BackendStatus, FileFallback, NamespaceStats, StoreAdapter,
    MAX_RECORDS_PER_USER,
};
