//! Dynamic content strategies
//!
//! Each strategy decides how one request is resolved between a rule's cache
//! and the network. Network attempts are bounded by the rule's
//! `waitForNetworkMs`; running out of time or failing outright both yield
//! the gateway-timeout sentinel rather than an error.

use crate::adapter::{Request, Response};
use crate::cache::{CacheFacade, FetchFacade};
use crate::error::WorkerResult;
use crate::log::Logger;
use crate::task::{fork, memoize, race_with_timeout, task, Task};
use crate::worker::Operation;
use chrono::{DateTime, Utc};
use futures_util::future::{self, Either};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Header recording when a dynamic response was stored
pub const CACHED_AT_HEADER: &str = "x-worker-cached-at";

/// How a dynamic request is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Serve from cache; a miss is a 404
    CacheOnly,
    /// Always go to the network, storing successful responses
    NetworkOnly,
    /// Serve from cache, going to the network on a miss
    CacheFirst,
    /// Go to the network, falling back to cache on failure or timeout
    NetworkFirst,
    /// Race cache against network; the first usable answer wins
    Fastest,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CacheOnly => "cacheOnly",
            Self::NetworkOnly => "networkOnly",
            Self::CacheFirst => "cacheFirst",
            Self::NetworkFirst => "networkFirst",
            Self::Fastest => "fastest",
        };
        write!(f, "{}", s)
    }
}

impl Strategy {
    /// Build the response task for a request, plus any side-effect operation
    /// that must outlive it
    pub fn respond(self, rule: &RuleCache, request: &Request) -> (Task<Response>, Option<Operation>) {
        match self {
            Self::CacheOnly => (cache_only(rule, request), None),
            Self::NetworkOnly => (rule.network_and_store(request), None),
            Self::CacheFirst => (cache_first(rule, request), None),
            Self::NetworkFirst => (network_first(rule, request), None),
            Self::Fastest => {
                let (response, persist) = fastest(rule, request);
                (response, Some(persist))
            }
        }
    }
}

/// Cache and network access for one rule
#[derive(Clone)]
pub struct RuleCache {
    pub cache: CacheFacade,
    pub network: FetchFacade,
    pub logger: Logger,
    pub name: String,
    pub wait: Duration,
    pub max_age: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl RuleCache {
    /// Cached response, unless absent or older than `max_age`
    pub fn load_fresh(&self, request: &Request) -> Task<Option<Response>> {
        let this = self.clone();
        let request = request.clone();
        task(async move {
            let Some(response) = this.cache.load(this.name.as_str(), &request).await? else {
                return Ok(None);
            };

            if let (Some(max_age), Some(stored)) = (this.max_age, cached_at(&response)) {
                let expired = Utc::now()
                    .signed_duration_since(stored)
                    .to_std()
                    .map(|age| age > max_age)
                    .unwrap_or(false);
                if expired {
                    this.logger
                        .debug(format!("{} expired in {}", request.url, this.name));
                    this.cache.invalidate(this.name.as_str(), &request).await?;
                    return Ok(None);
                }
            }
            Ok(Some(response))
        })
    }

    /// Store a response with its timestamp, then evict down to `max_entries`
    pub fn store_stamped(&self, request: &Request, response: Response) -> Task<()> {
        let this = self.clone();
        let request = request.clone();
        task(async move {
            let stamped = response.with_header(CACHED_AT_HEADER, Utc::now().to_rfc3339());
            this.cache.store(this.name.as_str(), &request, stamped).await?;
            if let Some(max) = this.max_entries {
                this.evict(max).await?;
            }
            Ok(())
        })
    }

    /// Unbounded network attempt, without touching the cache
    pub fn network_attempt(&self, request: &Request) -> Task<Response> {
        let network = self.network.clone();
        let logger = self.logger.clone();
        let request = request.clone();
        task(async move { Ok(refresh_or_sentinel(&network, &logger, &request).await) })
    }

    /// Network response within the wait limit, storing it when successful.
    /// A store started before the deadline completes even if the deadline
    /// passes.
    pub fn network_and_store(&self, request: &Request) -> Task<Response> {
        let this = self.clone();
        let request = request.clone();
        let attempt = task(async move {
            let response = refresh_or_sentinel(&this.network, &this.logger, &request).await;
            if response.is_ok() {
                if let Err(e) = this.store_stamped(&request, response.clone()).await {
                    this.logger
                        .warn(format!("failed to cache {} in {}: {}", request.url, this.name, e));
                }
            }
            Ok(response)
        });
        race_with_timeout(attempt, self.wait, Response::gateway_timeout())
    }

    async fn evict(&self, max: usize) -> WorkerResult<()> {
        let keys = self.cache.list(self.name.as_str()).await?;
        if keys.len() <= max {
            return Ok(());
        }

        let mut aged = Vec::with_capacity(keys.len());
        for key in keys {
            let stored = self
                .cache
                .load(self.name.as_str(), &key)
                .await?
                .and_then(|r| cached_at(&r));
            aged.push((stored, key));
        }
        aged.sort_by(|a, b| a.0.cmp(&b.0));

        let excess = aged.len() - max;
        for (_, key) in aged.into_iter().take(excess) {
            self.logger
                .debug(format!("evicting {} from {}", key.url, self.name));
            self.cache.invalidate(self.name.as_str(), &key).await?;
        }
        Ok(())
    }
}

/// Timestamp a dynamic response was stored at
pub fn cached_at(response: &Response) -> Option<DateTime<Utc>> {
    response
        .header(CACHED_AT_HEADER)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|at| at.with_timezone(&Utc))
}

async fn refresh_or_sentinel(network: &FetchFacade, logger: &Logger, request: &Request) -> Response {
    match network.refresh(request).await {
        Ok(response) => response,
        Err(e) => {
            logger.warn(format!("network failed for {}: {}", request.url, e));
            Response::gateway_timeout()
        }
    }
}

fn cache_only(rule: &RuleCache, request: &Request) -> Task<Response> {
    let lookup = rule.load_fresh(request);
    task(async move { Ok(lookup.await?.unwrap_or_else(Response::not_found)) })
}

fn cache_first(rule: &RuleCache, request: &Request) -> Task<Response> {
    let lookup = rule.load_fresh(request);
    let network = rule.network_and_store(request);
    task(async move {
        match lookup.await? {
            Some(hit) => Ok(hit),
            None => network.await,
        }
    })
}

fn network_first(rule: &RuleCache, request: &Request) -> Task<Response> {
    let network = rule.network_and_store(request);
    let fallback = cache_only(rule, request);
    task(async move {
        let response = network.await?;
        if response.is_gateway_timeout() {
            fallback.await
        } else {
            Ok(response)
        }
    })
}

fn fastest(rule: &RuleCache, request: &Request) -> (Task<Response>, Operation) {
    // One network attempt feeds both the race, which gives up at the wait
    // limit, and the persist operation, which waits for it to finish.
    let shared = memoize(rule.network_attempt(request));

    let persist = {
        let network = fork(&shared);
        let rule = rule.clone();
        let request = request.clone();
        task(async move {
            let response = network.await?;
            if response.is_ok() && !response.is_sentinel() {
                rule.store_stamped(&request, response).await?;
            }
            Ok(())
        })
    };

    let cached = rule.load_fresh(request);
    let network = race_with_timeout(fork(&shared), rule.wait, Response::gateway_timeout());
    let race = task(async move {
        match future::select(cached, network).await {
            Either::Left((Ok(Some(hit)), _)) => Ok(hit),
            Either::Left((_, network)) => network.await,
            Either::Right((Ok(response), _)) if !response.is_sentinel() => Ok(response),
            Either::Right((network_result, cached)) => match cached.await {
                Ok(Some(hit)) => Ok(hit),
                _ => network_result,
            },
        }
    });

    (race, persist)
}
