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

// Adapter factory for creating store adapters from backend descriptors

use super::adapter::StoreAdapter;
use super::document::DocumentStoreAdapter;
use super::keyvalue::KeyValueStoreAdapter;
use crate::config::{BackendDescriptor, BackendKind};
use crate::error::{StoreError, StoreResult};
use std::sync::Arc;
use std::time::Duration;

pub struct AdapterFactory;

impl AdapterFactory {
    /// Create a store adapter for a backend descriptor
    pub fn create(
        descriptor: &BackendDescriptor,
        timeout: Duration,
    ) -> StoreResult<Arc<dyn StoreAdapter>> {
        if descriptor.uri.is_empty() {
            return Err(StoreError::Config(format!(
                "backend '{}' has no URI",
                descriptor.name
            )));
        }

        match descriptor.kind {
            BackendKind::DocumentStore => {
                let adapter = DocumentStoreAdapter::new(descriptor, timeout)
                    .map_err(|e| StoreError::Config(e.to_string()))?;
                Ok(Arc::new(adapter))
            }
            BackendKind::KeyValueStore => {
                let adapter = KeyValueStoreAdapter::new(descriptor, timeout)
                    .map_err(|e| StoreError::Config(e.to_string()))?;
                Ok(Arc::new(adapter))
            }
        }
    }
}
