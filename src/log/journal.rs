//! Persistent worker journal
//!
//! Appends the worker log stream to a JSON-lines file, by default
//! `~/.local/share/offline-worker/journal.log`. Write failures are logged
//! and dropped; the journal never interrupts the worker.

use crate::config::{schema::Config, ConfigManager};
use crate::log::{LogEntry, Logger};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::warn;

/// JSON-lines sink for worker log entries
pub struct Journal {
    enabled: bool,
    path: PathBuf,
}

impl Journal {
    /// Create a journal from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.journal,
            path: ConfigManager::journal_path(),
        }
    }

    /// Create an enabled journal writing to `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append one entry
    pub async fn write(&self, entry: &LogEntry) {
        if !self.enabled {
            return;
        }

        let mut line = match serde_json::to_string(entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal entry: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal: {}", e);
        }
    }

    /// Subscribe to `logger` and write entries until every logger handle is
    /// gone. Returns `None` when the journal is disabled.
    pub fn follow(self, logger: &Logger) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let mut entries = logger.subscribe();
        Some(tokio::spawn(async move {
            while let Some(entry) = entries.recv().await {
                self.write(&entry).await;
            }
        }))
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
