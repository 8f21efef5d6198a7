//! Configuration for progress tracking.

use serde::{Deserialize, Serialize};

/// Longest accepted memory-backend TTL (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 3600;

/// Storage backend for progress records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBackend {
    /// One JSON file per id under the progress directory.
    #[default]
    File,
    /// In-process TTL cache.
    Memory,
}

/// Configuration for [`ProgressTracker`](super::ProgressTracker).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressConfig {
    #[serde(default)]
    pub backend: ProgressBackend,

    /// Lifetime of memory-backend entries, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Minimum interval between persisted same-stage updates for one id.
    #[serde(default = "default_throttle")]
    pub throttle_ms: u64,

    /// Records older than this are removed by the cleanup sweep.
    #[serde(default = "default_cleanup_max_age")]
    pub cleanup_max_age_secs: u64,
}

fn default_ttl() -> u64 {
    3600
}

fn default_throttle() -> u64 {
    100
}

fn default_cleanup_max_age() -> u64 {
    3600
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            backend: ProgressBackend::default(),
            ttl_secs: default_ttl(),
            throttle_ms: default_throttle(),
            cleanup_max_age_secs: default_cleanup_max_age(),
        }
    }
}

impl ProgressConfig {
    pub fn with_backend(mut self, backend: ProgressBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.throttle_ms = throttle_ms;
        self
    }
}
