//! External collaborators
//!
//! The worker consumes exactly two platform primitives: a key-value byte
//! cache ([`CacheStorage`]) and an HTTP fetch ([`Fetcher`]). Both are traits
//! so they can be backed by memory, disk, a real network, or a test double.
//! Requests and responses are plain values; cache identity is
//! `(method, url)`.

pub mod disk;
pub mod http;
pub mod memory;

pub use disk::DiskCacheStorage;
pub use http::HttpFetcher;
pub use memory::{MemoryCacheStorage, MemoryOrigin};

use crate::error::WorkerResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Header marking a response synthesized by the worker itself
pub const SENTINEL_HEADER: &str = "x-worker-sentinel";

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Parse a method name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An outgoing or intercepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,

    /// Origin-relative path with optional query, or an absolute URL
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
}

impl Request {
    /// Create a bodiless request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Attach a body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Same request aimed at a different URL
    pub fn redirect_to(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    /// Whether this is a GET, the only method ever served from cache
    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }

    /// URL with query string and fragment removed
    pub fn path(&self) -> &str {
        strip_query(&self.url)
    }

    /// Identity used by the cache store: method and URL only
    pub fn cache_key(&self) -> Self {
        Self::new(self.method, self.url.clone())
    }
}

/// Strip query and fragment from a URL
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// A response from the network, the cache, or the worker itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// 200 with a body
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    /// Worker-generated 404, used when a cache-only lookup misses
    pub fn not_found() -> Self {
        Self::new(404, "Not Found").with_header(SENTINEL_HEADER, "not-found")
    }

    /// Worker-generated 504, standing in for a network failure or timeout
    pub fn gateway_timeout() -> Self {
        Self::new(504, "Gateway Timeout").with_header(SENTINEL_HEADER, "gateway-timeout")
    }

    /// Add or replace a header (names are lower-cased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Status in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response was synthesized by the worker
    pub fn is_sentinel(&self) -> bool {
        self.headers.contains_key(SENTINEL_HEADER)
    }

    /// Whether this is the gateway-timeout sentinel
    pub fn is_gateway_timeout(&self) -> bool {
        self.header(SENTINEL_HEADER) == Some("gateway-timeout")
    }

    /// Body as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Named byte caches keyed by request identity
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Find the stored response for a request in one cache
    async fn match_request(&self, cache: &str, request: &Request) -> WorkerResult<Option<Response>>;

    /// Store (or overwrite) a response, creating the cache if needed
    async fn put(&self, cache: &str, request: &Request, response: &Response) -> WorkerResult<()>;

    /// Delete one entry, reporting whether it existed
    async fn delete_entry(&self, cache: &str, request: &Request) -> WorkerResult<bool>;

    /// Requests stored in a cache (empty if the cache does not exist)
    async fn keys(&self, cache: &str) -> WorkerResult<Vec<Request>>;

    /// Delete a whole cache, reporting whether it existed
    async fn delete_cache(&self, cache: &str) -> WorkerResult<bool>;

    /// Names of all existing caches
    async fn cache_names(&self) -> WorkerResult<Vec<String>>;

    /// Human-readable backend name for display
    fn storage_name(&self) -> &'static str;
}

/// The network fetch primitive
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a request. Non-2xx statuses are responses, not errors;
    /// errors mean the request could not complete at all.
    async fn fetch(&self, request: &Request) -> WorkerResult<Response>;
}
