//! In-process cache store and origin
//!
//! `MemoryCacheStorage` keeps caches in a map for the lifetime of the
//! process. `MemoryOrigin` is a scripted [`Fetcher`] serving canned
//! responses, for embedding the worker without a network and for tests.

use crate::adapter::{strip_query, CacheStorage, Fetcher, Method, Request, Response};
use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type Entries = BTreeMap<(Method, String), (Request, Response)>;

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> WorkerResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| WorkerError::Internal(format!("{} lock poisoned", what)))
}

/// Cache store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: Mutex<BTreeMap<String, Entries>>,
}

impl MemoryCacheStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn match_request(&self, cache: &str, request: &Request) -> WorkerResult<Option<Response>> {
        let caches = lock(&self.caches, "cache store")?;
        Ok(caches
            .get(cache)
            .and_then(|entries| entries.get(&(request.method, request.url.clone())))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, cache: &str, request: &Request, response: &Response) -> WorkerResult<()> {
        let mut caches = lock(&self.caches, "cache store")?;
        caches.entry(cache.to_string()).or_default().insert(
            (request.method, request.url.clone()),
            (request.cache_key(), response.clone()),
        );
        Ok(())
    }

    async fn delete_entry(&self, cache: &str, request: &Request) -> WorkerResult<bool> {
        let mut caches = lock(&self.caches, "cache store")?;
        Ok(caches
            .get_mut(cache)
            .and_then(|entries| entries.remove(&(request.method, request.url.clone())))
            .is_some())
    }

    async fn keys(&self, cache: &str) -> WorkerResult<Vec<Request>> {
        let caches = lock(&self.caches, "cache store")?;
        Ok(caches
            .get(cache)
            .map(|entries| entries.values().map(|(req, _)| req.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete_cache(&self, cache: &str) -> WorkerResult<bool> {
        let mut caches = lock(&self.caches, "cache store")?;
        Ok(caches.remove(cache).is_some())
    }

    async fn cache_names(&self) -> WorkerResult<Vec<String>> {
        let caches = lock(&self.caches, "cache store")?;
        Ok(caches.keys().cloned().collect())
    }

    fn storage_name(&self) -> &'static str {
        "memory"
    }
}

/// How the origin answers one path
#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail(String),
    Hang,
    Delay(Duration, Response),
}

/// Scripted origin server
///
/// Paths are matched without their query string, so cache-busting
/// parameters do not affect routing. Unscripted paths answer 404.
#[derive(Debug, Default)]
pub struct MemoryOrigin {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<Request>>,
}

impl MemoryOrigin {
    /// Create an origin with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `path`
    pub fn respond(&self, path: &str, response: Response) {
        self.set(path, Route::Respond(response));
    }

    /// Serve a 200 text body for `path`
    pub fn respond_text(&self, path: &str, body: &str) {
        self.respond(path, Response::ok(body));
    }

    /// Make requests for `path` fail at the network level
    pub fn fail(&self, path: &str, reason: &str) {
        self.set(path, Route::Fail(reason.to_string()));
    }

    /// Make requests for `path` never complete
    pub fn hang(&self, path: &str) {
        self.set(path, Route::Hang);
    }

    /// Serve `response` for `path` after `latency`
    pub fn respond_after(&self, path: &str, latency: Duration, response: Response) {
        self.set(path, Route::Delay(latency, response));
    }

    /// Forget any script for `path`
    pub fn forget(&self, path: &str) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.remove(path);
        }
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests seen for a path (query ignored)
    pub fn hits(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.path() == path)
            .count()
    }

    fn set(&self, path: &str, route: Route) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(path.to_string(), route);
        }
    }
}

#[async_trait]
impl Fetcher for MemoryOrigin {
    async fn fetch(&self, request: &Request) -> WorkerResult<Response> {
        lock(&self.requests, "origin log")?.push(request.clone());

        let route = lock(&self.routes, "origin routes")?
            .get(strip_query(&request.url))
            .cloned();

        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(reason)) => Err(WorkerError::network(&request.url, reason)),
            Some(Route::Hang) => std::future::pending().await,
            Some(Route::Delay(latency, response)) => {
                tokio::time::sleep(latency).await;
                Ok(response)
            }
            None => Ok(Response::new(404, "Not Found")),
        }
    }
}
