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

// Error taxonomy for the persistence router

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure classes of the persistence subsystem.
///
/// None of these ever surface to the bot's end user: the router absorbs
/// them, logs them and reflects them in per-backend health. They exist
/// so failover decisions and admin tooling can tell failure modes apart.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable at connect/ping time. Recovered by skipping
    /// the backend during selection.
    #[error("connection failed: {0}")]
    Connection(anyhow::Error),

    /// Backend reachable but the write was rejected or timed out.
    /// Recovered by one failover attempt, then the file fallback.
    #[error("write failed: {0}")]
    Write(anyhow::Error),

    /// Backend reachable but the query failed. Recovered by omitting
    /// that backend's partial results from the merge.
    #[error("read failed: {0}")]
    Read(anyhow::Error),

    /// Malformed backend descriptor. Recovered by skipping it entirely.
    #[error("invalid backend configuration: {0}")]
    Config(String),

    /// The file fallback itself failed. Unrecovered: the record is
    /// dropped and the failure logged.
    #[error("fallback file I/O failed: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("no backend named '{0}' is configured")]
    UnknownBackend(String),

    #[error("backend '{0}' is not connected")]
    NotConnected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_error_display() {
        let err = StoreError::Write(anyhow!("boom"));
        assert_eq!(err.to_string(), "write failed: boom");

        let err = StoreError::UnknownBackend("primary".to_string());
        assert!(err.to_string().contains("primary"));

        let err = StoreError::NotConnected("kv_cache".to_string());
        assert!(err.to_string().contains("kv_cache"));
    }
}
