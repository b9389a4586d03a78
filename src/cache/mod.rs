//! Cache and network facades
//!
//! Every physical cache is named by content: `<group>:<version>` for
//! manifest groups, `<plugin>:<key>` for plugin-owned caches, and
//! `ngsw:<slot>` for the persisted manifests. Concurrent writers in one
//! install batch therefore never share a cache name.
//!
//! # Persisted slots
//!
//! | Cache | Contents |
//! |-------|----------|
//! | `ngsw:installing` | Manifest of the installed, not yet active version |
//! | `ngsw:active` | Manifest of the version serving fetches |

pub mod network;
pub mod store;

pub use network::{bust_url, FetchFacade};
pub use store::CacheFacade;

/// Cache holding the manifest of the version being installed
pub const INSTALLING_SLOT: &str = "ngsw:installing";

/// Cache holding the manifest of the active version
pub const ACTIVE_SLOT: &str = "ngsw:active";
