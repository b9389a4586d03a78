//! Built-in plugins
//!
//! | Plugin | Manifest key | Caches |
//! |--------|--------------|--------|
//! | [`StaticContentPlugin`] | `groups` | `<group>:<version>` |
//! | [`DynamicContentPlugin`] | `dynamic` | `dynamic:<rule>` |
//! | [`RoutesPlugin`] | `routing` | none |
//! | [`PushPlugin`] | `push` | none |

pub mod dynamic;
pub mod push;
pub mod routes;
pub mod static_content;

pub use dynamic::DynamicContentPlugin;
pub use push::{PushEvent, PushHub, PushPlugin};
pub use routes::RoutesPlugin;
pub use static_content::StaticContentPlugin;

use crate::manifest::Manifest;
use crate::worker::{factory, PluginFactory};
use std::sync::Arc;

/// The standard plugin set in declaration order. Routing unshifts its
/// instruction, so it is consulted before the others despite coming later.
pub fn defaults(hub: Arc<PushHub>) -> Vec<PluginFactory> {
    vec![
        factory(|m: &Manifest| Ok(StaticContentPlugin::new(m))),
        factory(DynamicContentPlugin::new),
        factory(|m: &Manifest| Ok(RoutesPlugin::new(m))),
        factory(move |m: &Manifest| PushPlugin::new(m, Arc::clone(&hub))),
    ]
}
