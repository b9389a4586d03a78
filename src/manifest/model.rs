//! Manifest parsing
//!
//! The manifest is the declarative description of one application version:
//! which URLs to cache, grouped into independently versioned cache groups,
//! plus SPA routing rules and plugin-owned configuration sections.

use crate::error::{WorkerError, WorkerResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Number of hex characters kept from a derived group version hash
const VERSION_HASH_LEN: usize = 12;

/// Hash bytes with SHA256, returning the full lowercase hex digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Build the physical cache name for a group at a version.
///
/// This is a pure function of its inputs: identical content always lands in
/// the identical cache, changed content always lands in a new one.
pub fn cache_name(group: &str, version: &str) -> String {
    format!("{}:{}", group, version)
}

/// A single cached URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Request path of the resource
    pub url: String,

    /// Content hash supplied by the build
    pub hash: Option<String>,

    /// Name of the owning group (lookup only)
    pub group: String,
}

/// A named set of URLs sharing one version and one physical cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheGroup {
    /// Group name
    pub name: String,

    /// Explicit or derived version
    pub version: String,

    /// Entries keyed by URL
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheGroup {
    /// Physical cache backing this group
    pub fn cache_name(&self) -> String {
        cache_name(&self.name, &self.version)
    }

    /// Whether the group lists a URL
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }
}

/// SPA fallback routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    /// URL served in place of any matching route
    pub index: String,

    /// Route patterns keyed by URL
    #[serde(default)]
    pub routes: BTreeMap<String, RouteRule>,
}

/// How a declared route matches request paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Match any path starting with the route URL instead of only the exact URL
    #[serde(default)]
    pub prefix: bool,

    /// Skip paths whose last segment looks like a file (has an extension)
    #[serde(default)]
    pub only_without_extension: bool,
}

#[derive(Debug, Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    dev: bool,

    #[serde(default)]
    groups: BTreeMap<String, GroupDoc>,

    #[serde(default)]
    routing: Option<Routing>,

    #[serde(flatten)]
    extensions: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GroupDoc {
    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    urls: BTreeMap<String, EntryDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct EntryDoc {
    #[serde(default)]
    hash: Option<String>,
}

/// A parsed, validated manifest. Immutable once built.
#[derive(Debug, Clone)]
pub struct Manifest {
    raw: String,
    hash: String,
    dev: bool,
    groups: BTreeMap<String, CacheGroup>,
    routing: Option<Routing>,
    extensions: serde_json::Map<String, serde_json::Value>,
    url_index: HashMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from its serialized form.
    ///
    /// Fails as a whole on malformed JSON or on an unversioned group with
    /// an entry lacking a hash.
    pub fn parse(raw: &str) -> WorkerResult<Self> {
        let doc: ManifestDoc = serde_json::from_str(raw)
            .map_err(|e| WorkerError::ManifestInvalid(e.to_string()))?;

        let mut groups = BTreeMap::new();
        let mut url_index = HashMap::new();

        for (name, group_doc) in doc.groups {
            let group = build_group(&name, group_doc)?;
            for url in group.entries.keys() {
                url_index.entry(url.clone()).or_insert_with(|| name.clone());
            }
            groups.insert(name, group);
        }

        if let Some(routing) = &doc.routing {
            if routing.index.is_empty() {
                return Err(WorkerError::ManifestInvalid(
                    "routing.index must not be empty".to_string(),
                ));
            }
        }

        Ok(Self {
            hash: sha256_hex(raw.as_bytes()),
            raw: raw.to_string(),
            dev: doc.dev,
            groups,
            routing: doc.routing,
            extensions: doc.extensions,
            url_index,
        })
    }

    /// Parse a manifest from raw response bytes
    pub fn parse_bytes(bytes: &[u8]) -> WorkerResult<Self> {
        let raw = std::str::from_utf8(bytes)
            .map_err(|e| WorkerError::ManifestInvalid(format!("not UTF-8: {}", e)))?;
        Self::parse(raw)
    }

    /// Original serialized bytes, as fetched
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Content hash of the serialized form
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether caching is disabled entirely
    pub fn is_dev(&self) -> bool {
        self.dev
    }

    /// All cache groups
    pub fn groups(&self) -> &BTreeMap<String, CacheGroup> {
        &self.groups
    }

    /// Look up a group by name
    pub fn group(&self, name: &str) -> Option<&CacheGroup> {
        self.groups.get(name)
    }

    /// Find the entry for a URL in whichever group lists it
    pub fn entry(&self, url: &str) -> Option<&CacheEntry> {
        let group = self.url_index.get(url)?;
        self.groups.get(group)?.entries.get(url)
    }

    /// Routing rules, if declared
    pub fn routing(&self) -> Option<&Routing> {
        self.routing.as_ref()
    }

    /// Raw plugin-owned section
    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.get(key)
    }

    /// Deserialize a plugin-owned section
    pub fn extension_as<T: DeserializeOwned>(&self, key: &str) -> WorkerResult<Option<T>> {
        match self.extensions.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| WorkerError::ManifestInvalid(format!("section '{}': {}", key, e))),
        }
    }

    /// Whether two manifests serialize byte-identically
    pub fn same_bytes(&self, other: &Manifest) -> bool {
        self.hash == other.hash && self.raw == other.raw
    }
}

fn build_group(name: &str, doc: GroupDoc) -> WorkerResult<CacheGroup> {
    let entries: BTreeMap<String, CacheEntry> = doc
        .urls
        .into_iter()
        .map(|(url, entry)| {
            let entry = CacheEntry {
                url: url.clone(),
                hash: entry.hash,
                group: name.to_string(),
            };
            (url, entry)
        })
        .collect();

    let version = match doc.version {
        Some(version) => version,
        None => derive_version(name, &entries)?,
    };

    Ok(CacheGroup {
        name: name.to_string(),
        version,
        entries,
    })
}

/// Hash over every entry hash, ordered by URL
fn derive_version(group: &str, entries: &BTreeMap<String, CacheEntry>) -> WorkerResult<String> {
    let mut hashes = Vec::with_capacity(entries.len());
    for entry in entries.values() {
        let hash = entry
            .hash
            .as_deref()
            .ok_or_else(|| WorkerError::MissingEntryHash {
                group: group.to_string(),
                url: entry.url.clone(),
            })?;
        hashes.push(hash);
    }

    let digest = sha256_hex(hashes.join("\n").as_bytes());
    Ok(digest[..VERSION_HASH_LEN].to_string())
}
