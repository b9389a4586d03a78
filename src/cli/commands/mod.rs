//! CLI command implementations

pub mod completions;
pub mod config;
pub mod diff;
pub mod fetch;
pub mod inspect;
pub mod lifecycle;
pub mod status;

pub use completions::execute as completions;
pub use config::execute as config;
pub use diff::execute as diff;
pub use fetch::execute as fetch;
pub use inspect::execute as inspect;
pub use lifecycle::{activate, install};
pub use status::execute as status;

use crate::adapter::{DiskCacheStorage, HttpFetcher};
use crate::cli::args::TargetArgs;
use crate::config::{Config, ConfigManager};
use crate::driver::Driver;
use crate::error::{WorkerError, WorkerResult};
use crate::log::journal::Journal;
use crate::log::Logger;
use crate::manifest::Manifest;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Read and parse a manifest file
pub(crate) async fn read_manifest(path: &Path) -> WorkerResult<Manifest> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| WorkerError::io(format!("reading manifest {}", path.display()), e))?;
    Manifest::parse_bytes(&bytes)
}

/// First twelve characters of a manifest hash
pub(crate) fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// A driver wired to the disk cache and the HTTP origin, with its log
/// stream going to the journal
pub(crate) struct LocalWorker {
    driver: Driver,
    origin: String,
    cache_dir: PathBuf,
    journal: Option<JoinHandle<()>>,
}

impl LocalWorker {
    /// Build the driver for `target`, falling back to the configured origin
    /// and cache directory
    pub(crate) fn open(config: &Config, target: &TargetArgs) -> Self {
        let mut worker = config.worker.clone();
        if let Some(origin) = &target.origin {
            worker.origin = origin.clone();
        }
        let cache_dir = target
            .cache_dir
            .clone()
            .unwrap_or_else(|| ConfigManager::cache_dir(config));
        debug!(
            "Opening worker: origin={} cache={}",
            worker.origin,
            cache_dir.display()
        );

        let logger = Logger::new(config.general.log_buffer);
        let journal = Journal::new(config).follow(&logger);
        let fetcher = HttpFetcher::new(worker.origin.clone(), worker.request_timeout());
        let storage = DiskCacheStorage::new(cache_dir.clone());

        Self {
            origin: worker.origin.clone(),
            driver: Driver::new(worker, Arc::new(storage), Arc::new(fetcher), logger),
            cache_dir,
            journal,
        }
    }

    pub(crate) fn driver(&self) -> &Driver {
        &self.driver
    }

    pub(crate) fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Wait for background work, then let the journal drain
    pub(crate) async fn close(self) {
        self.driver.settle().await;
        drop(self.driver);
        if let Some(journal) = self.journal {
            let _ = journal.await;
        }
    }
}
