// Copyright 2025 RISC Zero, Inc.
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

//! Runtime configuration for a day computation.

use std::time::Duration;

/// Default timeout applied to every beacon API request.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of block fetches allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Tunables consumed by [crate::calculate] and friends.
///
/// One value is threaded through the whole computation; nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthStoreConfig {
    /// Timeout for a single beacon API request.
    pub api_timeout: Duration,
    /// Upper bound on concurrent block fetches while scanning a day.
    pub max_concurrent_requests: usize,
    /// Verbosity of the engine's diagnostic logging. Zero disables the per-deposit, progress and
    /// result dumps. Has no effect on the computed figures.
    pub debug_level: u64,
}

impl Default for EthStoreConfig {
    fn default() -> Self {
        Self {
            api_timeout: DEFAULT_API_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            debug_level: 0,
        }
    }
}

impl EthStoreConfig {
    /// Set [Self::api_timeout].
    pub fn with_api_timeout(self, api_timeout: Duration) -> Self {
        Self { api_timeout, ..self }
    }

    /// Set [Self::max_concurrent_requests]. Zero is treated as one.
    pub fn with_max_concurrent_requests(self, max_concurrent_requests: usize) -> Self {
        Self { max_concurrent_requests: max_concurrent_requests.max(1), ..self }
    }

    /// Set [Self::debug_level].
    pub fn with_debug_level(self, debug_level: u64) -> Self {
        Self { debug_level, ..self }
    }

    /// Whether diagnostic logging is enabled.
    pub fn debug(&self) -> bool {
        self.debug_level > 0
    }

    /// The effective concurrency bound, never less than one.
    pub(crate) fn concurrency(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = EthStoreConfig::default();
        assert_eq!(config.api_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrent_requests, 10);
        assert!(!config.debug());
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let config = EthStoreConfig::default().with_max_concurrent_requests(0);
        assert_eq!(config.concurrency(), 1);

        let config = EthStoreConfig { max_concurrent_requests: 0, ..Default::default() };
        assert_eq!(config.concurrency(), 1);
    }
}
