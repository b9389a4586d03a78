//! Cache store facade
//!
//! Narrow wrapper over [`CacheStorage`] handing out deferred [`Task`]s, so
//! callers can assemble cache work into instruction and operation lists
//! before anything touches the store. No retries happen here.

use crate::adapter::{CacheStorage, Request, Response};
use crate::task::{task, Task};
use std::sync::Arc;
use tracing::debug;

/// Cloneable handle to the byte cache
#[derive(Clone)]
pub struct CacheFacade {
    storage: Arc<dyn CacheStorage>,
}

impl CacheFacade {
    /// Wrap a cache store
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Underlying store
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Look up a response. Only GET requests are ever served from cache;
    /// anything else resolves to `None`.
    pub fn load(&self, cache: impl Into<String>, request: &Request) -> Task<Option<Response>> {
        let storage = Arc::clone(&self.storage);
        let cache = cache.into();
        let request = request.cache_key();
        task(async move {
            if !request.is_get() {
                return Ok(None);
            }
            storage.match_request(&cache, &request).await
        })
    }

    /// Store a response, overwriting any previous one
    pub fn store(&self, cache: impl Into<String>, request: &Request, response: Response) -> Task<()> {
        let storage = Arc::clone(&self.storage);
        let cache = cache.into();
        let request = request.cache_key();
        task(async move { storage.put(&cache, &request, &response).await })
    }

    /// Drop one entry
    pub fn invalidate(&self, cache: impl Into<String>, request: &Request) -> Task<()> {
        let storage = Arc::clone(&self.storage);
        let cache = cache.into();
        let request = request.cache_key();
        task(async move {
            if storage.delete_entry(&cache, &request).await? {
                debug!("Invalidated {} {} in {}", request.method, request.url, cache);
            }
            Ok(())
        })
    }

    /// Drop a whole cache
    pub fn remove(&self, cache: impl Into<String>) -> Task<()> {
        let storage = Arc::clone(&self.storage);
        let cache = cache.into();
        task(async move {
            if storage.delete_cache(&cache).await? {
                debug!("Removed cache {}", cache);
            }
            Ok(())
        })
    }

    /// Requests stored in a cache
    pub fn list(&self, cache: impl Into<String>) -> Task<Vec<Request>> {
        let storage = Arc::clone(&self.storage);
        let cache = cache.into();
        task(async move { storage.keys(&cache).await })
    }

    /// Names of every existing cache
    pub fn names(&self) -> Task<Vec<String>> {
        let storage = Arc::clone(&self.storage);
        task(async move { storage.cache_names().await })
    }

    /// Copy one entry between caches, reporting whether the source had it
    pub fn copy(&self, from: impl Into<String>, to: impl Into<String>, request: &Request) -> Task<bool> {
        let storage = Arc::clone(&self.storage);
        let from = from.into();
        let to = to.into();
        let request = request.cache_key();
        task(async move {
            match storage.match_request(&from, &request).await? {
                Some(response) => {
                    storage.put(&to, &request, &response).await?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}
