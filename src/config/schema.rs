//! Configuration schema
//!
//! Configuration is stored at `~/.config/offline-worker/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Origin and manifest location
    pub worker: WorkerConfig,

    /// Disk cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append worker log entries to the journal file
    pub journal: bool,

    /// Worker log entries kept while nothing is subscribed
    pub log_buffer: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
            log_buffer: crate::log::DEFAULT_BUFFER,
        }
    }
}

/// Where the application lives and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Base URL relative request URLs resolve against
    pub origin: String,

    /// Manifest location, relative to the origin
    pub manifest_url: String,

    /// Query parameter appended to bypass HTTP caches
    pub cache_bust_param: String,

    /// Per-request timeout for the HTTP fetcher
    pub request_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            manifest_url: "/ngsw-manifest.json".to_string(),
            cache_bust_param: "ngsw-cache-bust".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl WorkerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Disk cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (default: `~/.local/share/offline-worker/caches`)
    pub dir: Option<PathBuf>,
}
