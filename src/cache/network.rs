//! Fetch facade
//!
//! Wraps the [`Fetcher`] primitive with the two request flavours the worker
//! uses: a plain request that may be satisfied by intermediate HTTP caches,
//! and a refresh that appends a cache-busting query parameter to force a
//! trip to the origin.

use crate::adapter::{Fetcher, Request, Response};
use crate::task::{task, Task};
use std::sync::Arc;
use uuid::Uuid;

/// Cloneable handle to the network
#[derive(Clone)]
pub struct FetchFacade {
    fetcher: Arc<dyn Fetcher>,
    bust_param: String,
}

impl FetchFacade {
    /// Wrap a fetcher, busting caches with `bust_param`
    pub fn new(fetcher: Arc<dyn Fetcher>, bust_param: impl Into<String>) -> Self {
        Self {
            fetcher,
            bust_param: bust_param.into(),
        }
    }

    /// Plain network request
    pub fn request(&self, request: &Request) -> Task<Response> {
        let fetcher = Arc::clone(&self.fetcher);
        let request = request.clone();
        task(async move { fetcher.fetch(&request).await })
    }

    /// Network request that bypasses intermediate caches
    pub fn refresh(&self, request: &Request) -> Task<Response> {
        let busted = request.redirect_to(bust_url(&request.url, &self.bust_param));
        self.request(&busted)
    }
}

/// Append a random cache-busting query parameter
pub fn bust_url(url: &str, param: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, param, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryOrigin;

    #[test]
    fn bust_url_appends_param() {
        let plain = bust_url("/a.js", "ngsw-cache-bust");
        assert!(plain.starts_with("/a.js?ngsw-cache-bust="));

        let with_query = bust_url("/a.js?v=1", "ngsw-cache-bust");
        assert!(with_query.starts_with("/a.js?v=1&ngsw-cache-bust="));

        assert_ne!(bust_url("/a", "b"), bust_url("/a", "b"));
    }

    #[tokio::test]
    async fn refresh_hits_origin_with_busted_url() {
        let origin = Arc::new(MemoryOrigin::new());
        origin.respond_text("/a.js", "a");
        let network = FetchFacade::new(origin.clone(), "bust");

        let response = network.refresh(&Request::get("/a.js")).await.unwrap();
        assert_eq!(response.text(), "a");

        let seen = origin.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].url.starts_with("/a.js?bust="));
    }
}
