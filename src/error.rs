//! Error types for the offline worker
//!
//! All modules use `WorkerResult<T>` as their return type.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// All errors that can occur in the worker
#[derive(Error, Debug)]
pub enum WorkerError {
    // Manifest errors
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("Entry {url} in group {group} has no hash and the group declares no version")]
    MissingEntryHash { group: String, url: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Unexpected status {status} fetching {url}")]
    UnexpectedStatus { url: String, status: u16 },

    // Cache store errors
    #[error("Cache store error in {cache}: {reason}")]
    CacheStore { cache: String, reason: String },

    // Lifecycle errors
    #[error("Activation requested but no install has completed")]
    NothingToActivate,

    #[error("Install failed: {0}")]
    InstallFailed(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    Shared(Arc<WorkerError>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a cache store error
    pub fn cache_store(cache: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheStore {
            cache: cache.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Shared(inner) => inner.is_retryable(),
            other => matches!(
                other,
                Self::Network { .. } | Self::UnexpectedStatus { status: 500..=599, .. }
            ),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NothingToActivate => Some("Run: offline-worker install"),
            Self::MissingEntryHash { .. } => {
                Some("Give every entry a hash, or set an explicit version on the group")
            }
            Self::Network { .. } => Some("Check that worker.origin in the config is reachable"),
            _ => None,
        }
    }
}
