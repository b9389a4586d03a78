//! Driver
//!
//! Owns the worker lifecycle: at most one `active` version serving fetches
//! and at most one `installing` version waiting to be promoted. Install and
//! activate are serialized; fetches never wait for them and always see a
//! consistent `active` worker.
//!
//! # Lifecycle
//!
//! | Step | Effect |
//! |------|--------|
//! | `install` | Fetch manifest, populate caches, persist under `ngsw:installing` |
//! | `activate` | Clean up the old version, persist under `ngsw:active`, promote |
//! | `restore` | Rebuild both workers from the persisted manifests |

pub mod events;

pub use events::LifecycleEvent;

use crate::adapter::{CacheStorage, Fetcher, Request, Response};
use crate::cache::{CacheFacade, FetchFacade, ACTIVE_SLOT, INSTALLING_SLOT};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::log::Logger;
use crate::manifest::{diff, Manifest, ManifestDelta};
use crate::plugins::{self, PushEvent, PushHub};
use crate::task::parallel;
use crate::worker::{Message, PluginFactory, ReplyPort, VersionWorker};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::warn;

#[derive(Default)]
struct DriverState {
    active: Option<Arc<VersionWorker>>,
    installing: Option<Arc<VersionWorker>>,
}

/// Manifest hashes of the current workers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverStatus {
    pub active: Option<String>,
    pub installing: Option<String>,
}

/// The lifecycle state machine
pub struct Driver {
    config: WorkerConfig,
    cache: CacheFacade,
    network: FetchFacade,
    factories: Vec<PluginFactory>,
    push: Arc<PushHub>,
    logger: Logger,
    state: RwLock<DriverState>,
    lifecycle: Mutex<()>,
}

impl Driver {
    /// Create a driver with the standard plugin set
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        logger: Logger,
    ) -> Self {
        let push = Arc::new(PushHub::new());
        let network = FetchFacade::new(fetcher, config.cache_bust_param.clone());
        Self {
            factories: plugins::defaults(Arc::clone(&push)),
            cache: CacheFacade::new(storage),
            network,
            config,
            push,
            logger,
            state: RwLock::new(DriverState::default()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Replace the plugin set used for versions installed from now on
    pub fn with_plugins(mut self, factories: Vec<PluginFactory>) -> Self {
        self.factories = factories;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    /// Subscribers and notification channel shared by every version
    pub fn push_hub(&self) -> &Arc<PushHub> {
        &self.push
    }

    /// Listen for notifications raised by push payloads
    pub fn notifications(&self) -> broadcast::Receiver<PushEvent> {
        self.push.notifications()
    }

    pub async fn active(&self) -> Option<Arc<VersionWorker>> {
        self.state.read().await.active.clone()
    }

    pub async fn installing(&self) -> Option<Arc<VersionWorker>> {
        self.state.read().await.installing.clone()
    }

    pub async fn status(&self) -> DriverStatus {
        let state = self.state.read().await;
        DriverStatus {
            active: state.active.as_ref().map(|w| w.manifest().hash().to_string()),
            installing: state
                .installing
                .as_ref()
                .map(|w| w.manifest().hash().to_string()),
        }
    }

    /// Rebuild workers from the persisted manifest slots
    pub async fn restore(&self) -> WorkerResult<DriverStatus> {
        let _lifecycle = self.lifecycle.lock().await;

        let active = self.restore_slot(ACTIVE_SLOT).await?;
        let installing = self.restore_slot(INSTALLING_SLOT).await?;
        {
            let mut state = self.state.write().await;
            state.active = active;
            state.installing = installing;
        }

        let status = self.status().await;
        self.logger.info(format!(
            "restored active={} installing={}",
            short(status.active.as_deref()),
            short(status.installing.as_deref())
        ));
        Ok(status)
    }

    /// Fetch the manifest and prepare its version without serving it.
    ///
    /// On any failure the driver is left as it was, minus the caches the
    /// failed version filled. A previous installing version that is
    /// superseded here has its caches cleaned up.
    pub async fn install(&self) -> WorkerResult<DriverStatus> {
        let _lifecycle = self.lifecycle.lock().await;

        let manifest = Arc::new(self.fetch_manifest().await?);
        let (active, superseded) = {
            let state = self.state.read().await;
            (state.active.clone(), state.installing.clone())
        };

        let delta = diff(&manifest, active.as_ref().map(|w| w.manifest()));
        self.logger.info(format!(
            "installing {} ({})",
            short(Some(manifest.hash())),
            describe(&delta)
        ));

        let worker = self.build_worker(manifest)?;
        let operations = match &active {
            Some(previous) => worker.update(previous),
            None => worker.setup(),
        };
        let count = operations.len();

        if let Err(e) = parallel(operations).await {
            self.logger.error(format!("install failed: {}", e));
            // Caches the failed version already filled are referenced by no
            // worker once it is dropped.
            let retain = in_use([active.as_ref(), superseded.as_ref()]);
            if let Err(cleanup) = parallel(worker.cleanup(&retain)).await {
                self.logger
                    .warn(format!("cleanup of failed install failed: {}", cleanup));
            }
            return Err(WorkerError::InstallFailed(e.to_string()));
        }

        self.persist(INSTALLING_SLOT, &worker).await?;

        if let Some(old) = superseded {
            let retain = in_use([active.as_ref(), Some(&worker)]);
            if let Err(e) = parallel(old.cleanup(&retain)).await {
                self.logger
                    .warn(format!("cleanup of superseded install failed: {}", e));
            }
        }

        self.state.write().await.installing = Some(worker);
        self.logger
            .info(format!("install complete, {} operation(s)", count));
        Ok(self.status().await)
    }

    /// Promote the installed version to active
    pub async fn activate(&self) -> WorkerResult<DriverStatus> {
        let _lifecycle = self.lifecycle.lock().await;

        let (active, installing) = {
            let state = self.state.read().await;
            (state.active.clone(), state.installing.clone())
        };
        let installing = installing.ok_or(WorkerError::NothingToActivate)?;

        if let Some(old) = &active {
            let retain: HashSet<String> = installing.cache_names().into_iter().collect();
            parallel(old.cleanup(&retain)).await?;
        }

        self.persist(ACTIVE_SLOT, &installing).await?;
        self.cache.remove(INSTALLING_SLOT).await?;

        {
            let mut state = self.state.write().await;
            state.active = Some(Arc::clone(&installing));
            state.installing = None;
        }

        self.logger
            .info(format!("activated {}", short(Some(installing.manifest().hash()))));
        Ok(self.status().await)
    }

    /// Answer a request. Never fails: without an active version, or when the
    /// active version errors, the request goes straight to the network.
    pub async fn fetch(&self, request: &Request) -> Response {
        if let Some(worker) = self.active().await {
            match worker.fetch(request).await {
                Ok(response) => return response,
                Err(e) => {
                    self.logger
                        .warn(format!("worker failed on {}: {}, using network", request.url, e));
                }
            }
        }

        match self.network.request(request).await {
            Ok(response) => response,
            Err(e) => {
                self.logger
                    .warn(format!("network failed for {}: {}", request.url, e));
                Response::gateway_timeout()
            }
        }
    }

    /// Handle a client message, writing replies to its port
    pub async fn message(&self, message: Message) -> WorkerResult<()> {
        let replies = match message.command() {
            Some("ping") => vec![json!({"pong": true})],
            Some("status") => vec![serde_json::to_value(self.status().await)?],
            Some("checkUpdate") => {
                vec![json!({"updatePending": self.check_for_update().await?})]
            }
            Some("log") => {
                self.forward_log(message.reply.clone());
                Vec::new()
            }
            _ => match self.active().await {
                Some(worker) => worker.message(&message).await?,
                None => Vec::new(),
            },
        };

        for reply in replies {
            if message.reply.send(reply).is_err() {
                warn!("Reply port closed before all replies were sent");
                break;
            }
        }
        Ok(())
    }

    /// Hand a push payload to the active version
    pub async fn push(&self, payload: Value) {
        match self.active().await {
            Some(worker) => worker.push(&payload),
            None => self.logger.debug("push ignored, nothing active"),
        }
    }

    /// Whether the origin's manifest differs from the active one
    pub async fn check_for_update(&self) -> WorkerResult<bool> {
        let fresh = self.fetch_manifest().await?;
        let pending = match self.active().await {
            Some(worker) => worker.manifest().hash() != fresh.hash(),
            None => true,
        };
        self.logger
            .debug(format!("update check: pending={}", pending));
        Ok(pending)
    }

    /// Wait for background work of every current version
    pub async fn settle(&self) {
        let (active, installing) = {
            let state = self.state.read().await;
            (state.active.clone(), state.installing.clone())
        };
        for worker in active.iter().chain(installing.iter()) {
            worker.settle().await;
        }
    }

    async fn fetch_manifest(&self) -> WorkerResult<Manifest> {
        let request = Request::get(&self.config.manifest_url);
        let response = self.network.refresh(&request).await?;
        if !response.is_ok() {
            return Err(WorkerError::UnexpectedStatus {
                url: request.url,
                status: response.status,
            });
        }
        Manifest::parse_bytes(&response.body)
    }

    fn build_worker(&self, manifest: Arc<Manifest>) -> WorkerResult<Arc<VersionWorker>> {
        VersionWorker::new(
            manifest,
            self.cache.clone(),
            self.network.clone(),
            &self.factories,
            self.logger.clone(),
        )
    }

    async fn persist(&self, slot: &str, worker: &VersionWorker) -> WorkerResult<()> {
        let request = Request::get(&self.config.manifest_url);
        self.cache.remove(slot).await?;
        self.cache
            .store(slot, &request, Response::ok(worker.manifest().raw()))
            .await
    }

    async fn restore_slot(&self, slot: &str) -> WorkerResult<Option<Arc<VersionWorker>>> {
        let Some(key) = self.cache.list(slot).await?.into_iter().next() else {
            return Ok(None);
        };
        let Some(stored) = self.cache.load(slot, &key).await? else {
            return Ok(None);
        };
        let manifest = Manifest::parse_bytes(&stored.body)?;
        self.build_worker(Arc::new(manifest)).map(Some)
    }

    fn forward_log(&self, port: ReplyPort) {
        let mut entries = self.logger.subscribe();
        tokio::spawn(async move {
            while let Some(entry) = entries.recv().await {
                let value = match serde_json::to_value(&entry) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Failed to serialize log entry: {}", e);
                        continue;
                    }
                };
                if port.send(value).is_err() {
                    break;
                }
            }
        });
    }
}

fn short(hash: Option<&str>) -> &str {
    match hash {
        Some(hash) => &hash[..hash.len().min(12)],
        None => "-",
    }
}

/// Cache names referenced by any of `workers`
fn in_use<const N: usize>(workers: [Option<&Arc<VersionWorker>>; N]) -> HashSet<String> {
    workers
        .into_iter()
        .flatten()
        .flat_map(|worker| worker.cache_names())
        .collect()
}

fn describe(delta: &ManifestDelta) -> String {
    if delta.previous.is_none() {
        return "fresh install".to_string();
    }
    if !delta.changed {
        return "unchanged".to_string();
    }
    let added: usize = delta.groups.values().map(|g| g.added.len()).sum();
    let removed: usize = delta.groups.values().map(|g| g.removed.len()).sum();
    format!("+{} -{} across {} group(s)", added, removed, delta.groups.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryCacheStorage, MemoryOrigin};
    use tokio::sync::mpsc;

    const MANIFEST: &str = r#"{"groups": {"app": {"urls": {"/a.js": {"hash": "a1"}}}}}"#;

    fn driver(storage: &Arc<MemoryCacheStorage>, origin: &Arc<MemoryOrigin>) -> Driver {
        Driver::new(
            WorkerConfig::default(),
            storage.clone(),
            origin.clone(),
            Logger::new(50),
        )
    }

    fn origin() -> Arc<MemoryOrigin> {
        let origin = Arc::new(MemoryOrigin::new());
        origin.respond_text("/ngsw-manifest.json", MANIFEST);
        origin.respond_text("/a.js", "a");
        origin
    }

    #[tokio::test]
    async fn activate_without_install_fails() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let driver = driver(&storage, &origin());
        let err = driver.activate().await.unwrap_err();
        assert!(matches!(err, WorkerError::NothingToActivate));
    }

    #[tokio::test]
    async fn install_then_activate() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let origin = origin();
        let driver = driver(&storage, &origin);

        let status = driver.install().await.unwrap();
        assert!(status.active.is_none());
        assert!(status.installing.is_some());

        let status = driver.activate().await.unwrap();
        assert!(status.active.is_some());
        assert!(status.installing.is_none());

        origin.fail("/a.js", "offline");
        assert_eq!(driver.fetch(&Request::get("/a.js")).await.text(), "a");
    }

    #[tokio::test]
    async fn restore_resumes_from_slots() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let origin = origin();
        let first = driver(&storage, &origin);
        first.install().await.unwrap();
        first.activate().await.unwrap();

        let second = driver(&storage, &origin);
        let status = second.restore().await.unwrap();
        assert_eq!(status, first.status().await);
    }

    #[tokio::test]
    async fn fetch_without_active_uses_network() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let origin = origin();
        let driver = driver(&storage, &origin);

        assert_eq!(driver.fetch(&Request::get("/a.js")).await.text(), "a");
        origin.fail("/a.js", "offline");
        assert!(driver.fetch(&Request::get("/a.js")).await.is_gateway_timeout());
    }

    #[tokio::test]
    async fn builtin_messages() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let driver = driver(&storage, &origin());
        let (tx, mut rx) = mpsc::unbounded_channel();

        driver
            .message(Message::new(json!({"cmd": "ping"}), tx.clone()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), json!({"pong": true}));

        driver
            .message(Message::new(json!({"cmd": "checkUpdate"}), tx.clone()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), json!({"updatePending": true}));

        driver.install().await.unwrap();
        driver.activate().await.unwrap();
        assert!(!driver.check_for_update().await.unwrap());

        driver
            .message(Message::new(json!({"cmd": "status"}), tx))
            .await
            .unwrap();
        let status = rx.recv().await.unwrap();
        assert!(status["active"].is_string());
        assert!(status["installing"].is_null());
    }

    #[tokio::test]
    async fn log_command_streams_backlog() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let driver = driver(&storage, &origin());
        driver.logger().info("before subscribe");
        let (tx, mut rx) = mpsc::unbounded_channel();

        driver
            .message(Message::new(json!({"cmd": "log"}), tx))
            .await
            .unwrap();
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry["message"], "before subscribe");
    }

    #[test]
    fn short_hashes() {
        assert_eq!(short(None), "-");
        assert_eq!(short(Some("abc")), "abc");
        assert_eq!(short(Some("0123456789abcdef")), "0123456789ab");
    }
}
