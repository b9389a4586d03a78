//! Directory-backed cache store
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<sha256(cache name)[..16]>/
//!     _cache.json        {"name": "<cache name>"}
//!     <entry key>.json   stored request, status and headers
//!     <entry key>.body   raw response body
//! ```
//!
//! The entry key is the first 16 hex characters of SHA256 over
//! `"<METHOD> <url>"`.

use crate::adapter::{CacheStorage, Request, Response};
use crate::error::{WorkerError, WorkerResult};
use crate::manifest::sha256_hex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const CACHE_META: &str = "_cache.json";
const KEY_LEN: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    request: Request,
    status: u16,
    headers: BTreeMap<String, String>,
}

/// Cache store persisted as files under a root directory
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, cache: &str) -> PathBuf {
        self.root.join(&sha256_hex(cache.as_bytes())[..KEY_LEN])
    }

    fn entry_key(request: &Request) -> String {
        let identity = format!("{} {}", request.method, request.url);
        sha256_hex(identity.as_bytes())[..KEY_LEN].to_string()
    }

    async fn ensure_cache_dir(&self, cache: &str) -> WorkerResult<PathBuf> {
        let dir = self.cache_dir(cache);
        let meta_path = dir.join(CACHE_META);
        if !fs::try_exists(&meta_path).await.unwrap_or(false) {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| WorkerError::io(format!("creating cache dir {}", dir.display()), e))?;
            let meta = serde_json::to_vec(&CacheMeta {
                name: cache.to_string(),
            })?;
            write_file(&meta_path, &meta).await?;
            debug!("Created cache {} at {}", cache, dir.display());
        }
        Ok(dir)
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> WorkerResult<()> {
    fs::write(path, contents)
        .await
        .map_err(|e| WorkerError::io(format!("writing {}", path.display()), e))
}

/// Read a file, mapping "not found" to `None`
async fn read_optional(path: &Path) -> WorkerResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WorkerError::io(format!("reading {}", path.display()), e)),
    }
}

async fn remove_optional(path: &Path) -> WorkerResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WorkerError::io(format!("removing {}", path.display()), e)),
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn match_request(&self, cache: &str, request: &Request) -> WorkerResult<Option<Response>> {
        let dir = self.cache_dir(cache);
        let key = Self::entry_key(request);

        let Some(meta) = read_optional(&dir.join(format!("{}.json", key))).await? else {
            return Ok(None);
        };
        let entry: StoredEntry = serde_json::from_slice(&meta)?;

        let body = read_optional(&dir.join(format!("{}.body", key)))
            .await?
            .ok_or_else(|| WorkerError::cache_store(cache, format!("body missing for {}", request.url)))?;

        Ok(Some(Response {
            status: entry.status,
            headers: entry.headers,
            body,
        }))
    }

    async fn put(&self, cache: &str, request: &Request, response: &Response) -> WorkerResult<()> {
        let dir = self.ensure_cache_dir(cache).await?;
        let key = Self::entry_key(request);

        // Body first: a readable .json always has its body on disk
        write_file(&dir.join(format!("{}.body", key)), &response.body).await?;

        let entry = StoredEntry {
            request: request.cache_key(),
            status: response.status,
            headers: response.headers.clone(),
        };
        write_file(&dir.join(format!("{}.json", key)), &serde_json::to_vec(&entry)?).await
    }

    async fn delete_entry(&self, cache: &str, request: &Request) -> WorkerResult<bool> {
        let dir = self.cache_dir(cache);
        let key = Self::entry_key(request);
        let existed = remove_optional(&dir.join(format!("{}.json", key))).await?;
        remove_optional(&dir.join(format!("{}.body", key))).await?;
        Ok(existed)
    }

    async fn keys(&self, cache: &str) -> WorkerResult<Vec<Request>> {
        let dir = self.cache_dir(cache);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkerError::io(format!("listing {}", dir.display()), e)),
        };

        let mut requests = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WorkerError::io(format!("listing {}", dir.display()), e))?
        {
            let path = entry.path();
            let is_entry = path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != CACHE_META);
            if !is_entry {
                continue;
            }
            if let Some(bytes) = read_optional(&path).await? {
                let stored: StoredEntry = serde_json::from_slice(&bytes)?;
                requests.push(stored.request);
            }
        }

        requests.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(requests)
    }

    async fn delete_cache(&self, cache: &str) -> WorkerResult<bool> {
        let dir = self.cache_dir(cache);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Deleted cache {}", cache);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WorkerError::io(format!("removing {}", dir.display()), e)),
        }
    }

    async fn cache_names(&self) -> WorkerResult<Vec<String>> {
        let mut dirs = match fs::read_dir(&self.root).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(WorkerError::io(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut names = Vec::new();
        while let Some(dir) = dirs
            .next_entry()
            .await
            .map_err(|e| WorkerError::io(format!("listing {}", self.root.display()), e))?
        {
            let meta_path = dir.path().join(CACHE_META);
            match read_optional(&meta_path).await? {
                Some(bytes) => match serde_json::from_slice::<CacheMeta>(&bytes) {
                    Ok(meta) => names.push(meta.name),
                    Err(e) => warn!("Ignoring unreadable cache metadata {}: {}", meta_path.display(), e),
                },
                None => debug!("Skipping non-cache entry {}", dir.path().display()),
            }
        }

        names.sort();
        Ok(names)
    }

    fn storage_name(&self) -> &'static str {
        "disk"
    }
}
