//! Static content plugin
//!
//! Materializes every manifest group into its content-addressed cache and
//! serves listed URLs from it. On update, entries whose content is known to
//! be unchanged are copied from the previous version's cache instead of
//! being fetched again.

use crate::adapter::Request;
use crate::error::WorkerError;
use crate::manifest::{can_reuse, Manifest};
use crate::task::{task, Task};
use crate::worker::{Instructions, Operation, Plugin, VersionWorker};
use std::sync::Arc;

/// Serves the URLs listed in manifest groups
pub struct StaticContentPlugin {
    caches: Vec<String>,
}

impl StaticContentPlugin {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            caches: manifest.groups().values().map(|g| g.cache_name()).collect(),
        }
    }
}

impl Plugin for StaticContentPlugin {
    fn name(&self) -> &'static str {
        "static"
    }

    fn cache_names(&self) -> Vec<String> {
        self.caches.clone()
    }

    fn setup(&self, worker: &Arc<VersionWorker>) -> Vec<Operation> {
        worker
            .manifest()
            .groups()
            .values()
            .flat_map(|group| {
                let cache = group.cache_name();
                group
                    .entries
                    .keys()
                    .map(move |url| materialize(worker, cache.clone(), url.clone(), None))
            })
            .collect()
    }

    fn update(&self, worker: &Arc<VersionWorker>, previous: &Arc<VersionWorker>) -> Vec<Operation> {
        let current = worker.manifest();
        let prior = previous.manifest();

        let mut operations = Vec::new();
        for group in current.groups().values() {
            let cache = group.cache_name();
            for url in group.entries.keys() {
                let source = if can_reuse(current, prior, &group.name, url) {
                    prior
                        .entry(url)
                        .and_then(|entry| prior.group(&entry.group))
                        .map(|g| g.cache_name())
                        .filter(|source| *source != cache)
                } else {
                    None
                };
                operations.push(materialize(worker, cache.clone(), url.clone(), source));
            }
        }
        operations
    }

    fn fetch(
        &self,
        worker: &Arc<VersionWorker>,
        request: &Request,
        instructions: &mut Instructions,
        _carry_on: &mut Vec<Operation>,
    ) {
        if !request.is_get() {
            return;
        }
        let manifest = worker.manifest();
        let Some(group) = manifest
            .entry(&request.url)
            .and_then(|entry| manifest.group(&entry.group))
        else {
            return;
        };

        let cache = worker.cache().clone();
        let name = group.cache_name();
        let request = request.clone();
        instructions.push(
            "static",
            Box::new(move || cache.load(name, &request)),
        );
    }
}

/// Make sure `url` is present in `cache`: keep an existing copy, else copy
/// from `source`, else fetch from the origin. A non-2xx origin response fails
/// the operation.
fn materialize(
    worker: &Arc<VersionWorker>,
    cache: String,
    url: String,
    source: Option<String>,
) -> Task<()> {
    let store = worker.cache().clone();
    let network = worker.network().clone();
    let logger = worker.logger().clone();

    task(async move {
        let request = Request::get(&url);

        if store.load(cache.as_str(), &request).await?.is_some() {
            logger.debug(format!("{} already in {}", url, cache));
            return Ok(());
        }

        if let Some(source) = source {
            if store.copy(source.as_str(), cache.as_str(), &request).await? {
                logger.debug(format!("copied {} from {} to {}", url, source, cache));
                return Ok(());
            }
        }

        let response = network.refresh(&request).await?;
        if !response.is_ok() {
            return Err(WorkerError::UnexpectedStatus {
                url,
                status: response.status,
            });
        }
        store.store(cache.as_str(), &request, response).await?;
        logger.debug(format!("fetched {} into {}", url, cache));
        Ok(())
    })
}
