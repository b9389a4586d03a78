//! Configuration for offline-worker
//!
//! A TOML file under the platform config dir, overridable with `--config`
//! or `OFFLINE_WORKER_CONFIG`. A missing file yields the defaults.

pub mod schema;

pub use schema::{CacheConfig, Config, GeneralConfig, WorkerConfig};

use crate::error::{WorkerError, WorkerResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const APP_DIR: &str = "offline-worker";

fn platform_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Reads and writes the config file at one fixed location
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn default_config_path() -> PathBuf {
        platform_dir(dirs::config_dir()).join("config.toml")
    }

    /// Root for persisted caches and the journal
    pub fn state_dir() -> PathBuf {
        platform_dir(dirs::data_local_dir())
    }

    /// `[cache] dir` when set, else `<state_dir>/caches`
    pub fn cache_dir(config: &Config) -> PathBuf {
        match &config.cache.dir {
            Some(dir) => dir.clone(),
            None => Self::state_dir().join("caches"),
        }
    }

    pub fn journal_path() -> PathBuf {
        Self::state_dir().join("journal.log")
    }

    pub async fn load(&self) -> WorkerResult<Config> {
        match fs::read_to_string(&self.config_path).await {
            Ok(text) => Self::parse(&self.config_path, &text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.config_path.display(), "no config file, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(read_error(&self.config_path, e)),
        }
    }

    /// Load from `path`, which must exist
    pub async fn load_from_file(&self, path: &Path) -> WorkerResult<Config> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| read_error(path, e))?;
        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> WorkerResult<Config> {
        toml::from_str(text).map_err(|e| WorkerError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write `config`, creating parent directories. The file is replaced
    /// through a sibling temp file so readers never see a partial write.
    pub async fn save(&self, config: &Config) -> WorkerResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| WorkerError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let rendered = toml::to_string_pretty(config)?;
        let staging = self.config_path.with_extension("toml.tmp");
        let write_error = |e| {
            WorkerError::io(format!("writing config to {}", self.config_path.display()), e)
        };
        fs::write(&staging, rendered).await.map_err(write_error)?;
        fs::rename(&staging, &self.config_path)
            .await
            .map_err(write_error)?;

        info!(path = %self.config_path.display(), "config saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn read_error(path: &Path, e: std::io::Error) -> WorkerError {
    WorkerError::io(format!("reading config from {}", path.display()), e)
}
