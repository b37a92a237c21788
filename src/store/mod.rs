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

// Store backend module
//
// Provides a trait-based abstraction over heterogeneous interaction
// stores (document store, key-value store), the durable file fallback,
// and per-backend health bookkeeping. The router writes to exactly one
// adapter at a time and merges reads across all of them.

pub mod adapter;
pub mod document;
pub mod factory;
pub mod fallback;
pub mod health;
pub mod keyvalue;

pub use adapter::StoreAdapter;
pub use document::DocumentStoreAdapter;
pub use factory::AdapterFactory;
pub use fallback::{FileFallback, MAX_RECORDS_PER_USER};
pub use health::{BackendHealth, BackendStatus, HealthLedger, NamespaceStats};
pub use keyvalue::KeyValueStoreAdapter;
