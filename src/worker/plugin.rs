//! Plugin contract
//!
//! A plugin contributes to a [`VersionWorker`] in two ways: cache-mutating
//! [`Operation`]s for setup, update and cleanup, and [`Instruction`]s for
//! answering one request. Every method has a no-op default so a plugin only
//! implements the hooks it cares about.

use crate::adapter::{Request, Response};
use crate::error::WorkerResult;
use crate::manifest::Manifest;
use crate::task::{Candidate, Task};
use crate::worker::VersionWorker;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Deferred cache-mutating work, executed by the driver
pub type Operation = Task<()>;

/// Deferred candidate response for one request
pub type Instruction = Candidate<Response>;

/// Builds a plugin for one manifest version
pub type PluginFactory = Arc<dyn Fn(&Manifest) -> WorkerResult<Box<dyn Plugin>> + Send + Sync>;

/// Wrap a plugin constructor as a [`PluginFactory`]
pub fn factory<P, F>(build: F) -> PluginFactory
where
    P: Plugin + 'static,
    F: Fn(&Manifest) -> WorkerResult<P> + Send + Sync + 'static,
{
    Arc::new(move |manifest: &Manifest| -> WorkerResult<Box<dyn Plugin>> {
        let plugin: Box<dyn Plugin> = Box::new(build(manifest)?);
        Ok(plugin)
    })
}

/// Channel replies to a message are written to
pub type ReplyPort = mpsc::UnboundedSender<Value>;

/// A message from a client page
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Value,
    pub reply: ReplyPort,
}

impl Message {
    /// Create a message replying on `reply`
    pub fn new(payload: Value, reply: ReplyPort) -> Self {
        Self { payload, reply }
    }

    /// The `cmd` field, if present
    pub fn command(&self) -> Option<&str> {
        self.payload.get("cmd").and_then(Value::as_str)
    }
}

/// Ordered instruction list for one request.
///
/// Plugins append with [`push`](Self::push) by default; [`unshift`](Self::unshift)
/// jumps ahead of everything contributed so far.
#[derive(Default)]
pub struct Instructions {
    items: VecDeque<(String, Instruction)>,
}

impl Instructions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run after everything already listed
    pub fn push(&mut self, label: impl Into<String>, instruction: Instruction) {
        self.items.push_back((label.into(), instruction));
    }

    /// Run before everything already listed
    pub fn unshift(&mut self, label: impl Into<String>, instruction: Instruction) {
        self.items.push_front((label.into(), instruction));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Labels in evaluation order
    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub(crate) fn into_inner(self) -> VecDeque<(String, Instruction)> {
        self.items
    }
}

/// A caching strategy composed into a version worker
pub trait Plugin: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Caches this plugin owns for its manifest version
    fn cache_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Operations materializing caches on a fresh install
    fn setup(&self, _worker: &Arc<VersionWorker>) -> Vec<Operation> {
        Vec::new()
    }

    /// Operations materializing caches when replacing `previous`.
    /// Defaults to a fresh setup.
    fn update(&self, worker: &Arc<VersionWorker>, _previous: &Arc<VersionWorker>) -> Vec<Operation> {
        self.setup(worker)
    }

    /// Operations deleting owned caches that no surviving worker references
    fn cleanup(&self, worker: &Arc<VersionWorker>, retain: &HashSet<String>) -> Vec<Operation> {
        self.cache_names()
            .into_iter()
            .filter(|name| !retain.contains(name))
            .map(|name| worker.cache().remove(name))
            .collect()
    }

    /// Contribute instructions (and side-effect operations) for a request
    fn fetch(
        &self,
        _worker: &Arc<VersionWorker>,
        _request: &Request,
        _instructions: &mut Instructions,
        _carry_on: &mut Vec<Operation>,
    ) {
    }

    /// Handle a client message; `None` when the message is not for this plugin
    fn message(&self, _worker: &Arc<VersionWorker>, _message: &Message) -> Option<Task<Vec<Value>>> {
        None
    }

    /// Handle a push payload
    fn push(&self, _worker: &Arc<VersionWorker>, _payload: &Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ready;

    fn instruction() -> Instruction {
        Box::new(|| ready(None))
    }

    #[test]
    fn push_and_unshift_order() {
        let mut list = Instructions::new();
        list.push("static", instruction());
        list.push("dynamic", instruction());
        list.unshift("routes", instruction());
        assert_eq!(list.labels(), vec!["routes", "static", "dynamic"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn message_command() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let message = Message::new(serde_json::json!({"cmd": "ping"}), tx.clone());
        assert_eq!(message.command(), Some("ping"));

        let bare = Message::new(serde_json::json!({"hello": 1}), tx);
        assert!(bare.command().is_none());
    }
}
