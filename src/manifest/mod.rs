//! Manifest model and diffing
//!
//! A manifest describes one version of the served application. Every cache
//! group maps to a physical cache named `<group>:<version>`, so a changed
//! group always gets a fresh cache and an unchanged group keeps its old one.

pub mod diff;
pub mod model;

pub use diff::{can_reuse, diff, GroupDelta, ManifestDelta};
pub use model::{cache_name, sha256_hex, CacheEntry, CacheGroup, Manifest, RouteRule, Routing};
