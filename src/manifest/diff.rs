//! Manifest diffing
//!
//! Compares a freshly fetched manifest against the one currently installed
//! and classifies each resource as reusable or changed.

use crate::manifest::model::Manifest;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// URLs gained and lost by one group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDelta {
    /// In current, not in previous
    pub added: Vec<String>,

    /// In previous, not in current
    pub removed: Vec<String>,
}

impl GroupDelta {
    /// Whether the URL set is unchanged
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Difference between two manifests
#[derive(Debug, Clone)]
pub struct ManifestDelta {
    pub current: Arc<Manifest>,
    pub previous: Option<Arc<Manifest>>,

    /// False when there is no previous manifest or both serialize identically
    pub changed: bool,

    /// Per-group URL changes, keyed by group name
    pub groups: BTreeMap<String, GroupDelta>,
}

impl ManifestDelta {
    /// Whether the cached content for `url` in `group` can be copied from
    /// the previous version instead of refetched. See [`can_reuse`].
    pub fn can_reuse(&self, group: &str, url: &str) -> bool {
        match &self.previous {
            Some(previous) => can_reuse(&self.current, previous, group, url),
            None => false,
        }
    }
}

/// Compare `current` against `previous`.
pub fn diff(current: &Arc<Manifest>, previous: Option<&Arc<Manifest>>) -> ManifestDelta {
    let previous = match previous {
        Some(previous) if !previous.same_bytes(current) => previous,
        other => {
            return ManifestDelta {
                current: Arc::clone(current),
                previous: other.cloned(),
                changed: false,
                groups: BTreeMap::new(),
            };
        }
    };

    let names: BTreeSet<&String> = current
        .groups()
        .keys()
        .chain(previous.groups().keys())
        .collect();

    let groups = names
        .into_iter()
        .map(|name| {
            let now = urls_of(current, name);
            let before = urls_of(previous, name);
            let delta = GroupDelta {
                added: now.difference(&before).map(|u| u.to_string()).collect(),
                removed: before.difference(&now).map(|u| u.to_string()).collect(),
            };
            (name.clone(), delta)
        })
        .collect();

    ManifestDelta {
        current: Arc::clone(current),
        previous: Some(Arc::clone(previous)),
        changed: true,
        groups,
    }
}

fn urls_of<'a>(manifest: &'a Manifest, group: &str) -> BTreeSet<&'a str> {
    manifest
        .group(group)
        .map(|g| g.entries.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Whether an entry's previously cached content is still valid.
///
/// True when both sides carry a hash and the hashes match. When either side
/// lacks a hash the decision falls back to the owning group's version: an
/// unchanged version is taken to mean unchanged content. That fallback trusts
/// manifest authors to bump `version` whenever an unhashed group's content
/// changes; nothing here verifies it, and an unbumped change will keep
/// serving the old bytes.
pub fn can_reuse(current: &Manifest, previous: &Manifest, group: &str, url: &str) -> bool {
    let Some(current_group) = current.group(group) else {
        return false;
    };
    let Some(entry) = current_group.entries.get(url) else {
        return false;
    };
    let Some(old_entry) = previous.entry(url) else {
        return false;
    };

    match (&entry.hash, &old_entry.hash) {
        (Some(new_hash), Some(old_hash)) => new_hash == old_hash,
        _ => previous
            .group(&old_entry.group)
            .is_some_and(|old_group| {
                old_group.name == current_group.name && old_group.version == current_group.version
            }),
    }
}
