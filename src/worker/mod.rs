//! Version worker
//!
//! One [`VersionWorker`] exists per installed manifest. It composes the
//! plugins built for that manifest and exposes their combined contribution:
//! operation lists for setup, update and cleanup, and a fetch pipeline that
//! walks plugin instructions in order before falling through to the network.

pub mod plugin;

pub use plugin::{
    factory, Instruction, Instructions, Message, Operation, Plugin, PluginFactory, ReplyPort,
};

use crate::adapter::{Request, Response};
use crate::cache::{CacheFacade, FetchFacade};
use crate::error::{WorkerError, WorkerResult};
use crate::log::Logger;
use crate::manifest::Manifest;
use crate::task::{self, first_non_empty, parallel, spawn_detached, Task};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Everything needed to serve one manifest version
pub struct VersionWorker {
    manifest: Arc<Manifest>,
    cache: CacheFacade,
    network: FetchFacade,
    plugins: Vec<Box<dyn Plugin>>,
    logger: Logger,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl VersionWorker {
    /// Build a worker, invoking every factory once in declaration order
    pub fn new(
        manifest: Arc<Manifest>,
        cache: CacheFacade,
        network: FetchFacade,
        factories: &[PluginFactory],
        logger: Logger,
    ) -> WorkerResult<Arc<Self>> {
        let plugins = factories
            .iter()
            .map(|factory| factory(&manifest))
            .collect::<WorkerResult<Vec<_>>>()?;

        Ok(Arc::new(Self {
            manifest,
            cache,
            network,
            plugins,
            logger,
            background: Mutex::new(Vec::new()),
        }))
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    pub fn network(&self) -> &FetchFacade {
        &self.network
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Plugin names in declaration order
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Every cache owned by this worker's plugins
    pub fn cache_names(&self) -> BTreeSet<String> {
        self.plugins
            .iter()
            .flat_map(|p| p.cache_names())
            .collect()
    }

    /// Operations populating caches on a fresh install
    pub fn setup(self: &Arc<Self>) -> Vec<Operation> {
        if self.manifest.is_dev() {
            return Vec::new();
        }
        self.plugins.iter().flat_map(|p| p.setup(self)).collect()
    }

    /// Operations populating caches while replacing `previous`
    pub fn update(self: &Arc<Self>, previous: &Arc<VersionWorker>) -> Vec<Operation> {
        if self.manifest.is_dev() {
            return Vec::new();
        }
        self.plugins
            .iter()
            .flat_map(|p| p.update(self, previous))
            .collect()
    }

    /// Operations deleting caches no longer needed once this worker is gone.
    /// Caches named in `retain` belong to a surviving worker and are kept.
    pub fn cleanup(self: &Arc<Self>, retain: &HashSet<String>) -> Vec<Operation> {
        self.plugins
            .iter()
            .flat_map(|p| p.cleanup(self, retain))
            .collect()
    }

    /// Answer a request.
    ///
    /// Plugin instructions run strictly in order; the first one producing a
    /// response wins. The final instruction is a plain network request whose
    /// failure becomes the gateway-timeout sentinel. Side-effect operations
    /// contributed by plugins start with the pipeline and are not awaited.
    pub fn fetch(self: &Arc<Self>, request: &Request) -> Task<Response> {
        let network = self.network.clone();
        let logger = self.logger.clone();

        if self.manifest.is_dev() {
            let request = request.clone();
            return task::task(async move {
                Ok(network_or_sentinel(&network, &logger, &request).await)
            });
        }

        let mut instructions = Instructions::new();
        let mut carry_on = Vec::new();
        for plugin in &self.plugins {
            plugin.fetch(self, request, &mut instructions, &mut carry_on);
        }

        let labels = instructions.labels().join(",");
        let fallback_request = request.clone();
        instructions.push(
            "network",
            Box::new(move || {
                task::task(async move {
                    Ok(Some(
                        network_or_sentinel(&network, &logger, &fallback_request).await,
                    ))
                })
            }),
        );

        let worker = Arc::clone(self);
        let url = request.url.clone();
        let candidates = instructions
            .into_inner()
            .into_iter()
            .map(|(_, instruction)| instruction)
            .collect();

        task::task(async move {
            for operation in carry_on {
                worker.track(spawn_detached("carry-on", operation));
            }
            worker
                .logger
                .debug(format!("fetch {} via [{}]", url, labels));
            first_non_empty(candidates)
                .await?
                .ok_or_else(|| WorkerError::Internal(format!("no response for {}", url)))
        })
    }

    /// Fetch from the network, bypassing intermediate caches
    pub fn refresh(&self, request: &Request) -> Task<Response> {
        self.network.refresh(request)
    }

    /// Offer a message to every plugin and collect their replies
    pub fn message(self: &Arc<Self>, message: &Message) -> Task<Vec<Value>> {
        let handlers: Vec<Task<Vec<Value>>> = self
            .plugins
            .iter()
            .filter_map(|p| p.message(self, message))
            .collect();

        task::task(async move {
            let replies = parallel(handlers).await?;
            Ok(replies.into_iter().flatten().collect())
        })
    }

    /// Hand a push payload to every plugin
    pub fn push(self: &Arc<Self>, payload: &Value) {
        for plugin in &self.plugins {
            plugin.push(self, payload);
        }
    }

    /// Wait for every background operation started so far, including ones
    /// started while waiting
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = match self.background.lock() {
                Ok(mut background) => background.drain(..).collect(),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                let _ = handle.await;
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut background) = self.background.lock() {
            background.retain(|h| !h.is_finished());
            background.push(handle);
        }
    }
}

async fn network_or_sentinel(network: &FetchFacade, logger: &Logger, request: &Request) -> Response {
    match network.request(request).await {
        Ok(response) => response,
        Err(e) => {
            logger.warn(format!("network failed for {}: {}", request.url, e));
            Response::gateway_timeout()
        }
    }
}
