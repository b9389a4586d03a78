//! Push plugin
//!
//! Clients subscribe by sending `{"cmd": "push"}`; their reply ports then
//! receive every push payload. With `push.showNotifications` set, payloads
//! carrying a `notification` object also surface as a [`PushEvent`] on the
//! driver's notification channel.
//!
//! Subscriptions live in a [`PushHub`] shared across versions, so clients
//! stay subscribed when a new version is activated.

use crate::error::WorkerResult;
use crate::manifest::Manifest;
use crate::task::{ready, Task};
use crate::worker::{Message, Plugin, ReplyPort, VersionWorker};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Manifest key read by this plugin
pub const SECTION: &str = "push";

/// The `push` manifest section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSection {
    #[serde(default)]
    pub show_notifications: bool,
}

/// Something the platform should show the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PushEvent {
    Notification { title: String, body: String },
}

/// Push subscribers and the notification channel
pub struct PushHub {
    subscribers: Mutex<Vec<ReplyPort>>,
    events: broadcast::Sender<PushEvent>,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PushHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            subscribers: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Forward future payloads to `port`
    pub fn subscribe(&self, port: ReplyPort) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(port);
        }
    }

    /// Live subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|mut subscribers| {
                subscribers.retain(|port| !port.is_closed());
                subscribers.len()
            })
            .unwrap_or(0)
    }

    /// Listen for notifications
    pub fn notifications(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    /// Send a payload to every live subscriber, dropping closed ones
    pub fn deliver(&self, payload: &Value) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return 0;
        };
        subscribers.retain(|port| port.send(payload.clone()).is_ok());
        subscribers.len()
    }

    /// Raise a notification; dropped when nobody listens
    pub fn notify(&self, event: PushEvent) {
        if self.events.send(event).is_err() {
            debug!("Notification dropped, no listeners");
        }
    }
}

pub struct PushPlugin {
    config: PushSection,
    hub: Arc<PushHub>,
}

impl PushPlugin {
    pub fn new(manifest: &Manifest, hub: Arc<PushHub>) -> WorkerResult<Self> {
        Ok(Self {
            config: manifest.extension_as(SECTION)?.unwrap_or_default(),
            hub,
        })
    }
}

fn notification(payload: &Value) -> Option<PushEvent> {
    let notification = payload.get("notification")?.as_object()?;
    let field = |key: &str| {
        notification
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(PushEvent::Notification {
        title: field("title"),
        body: field("body"),
    })
}

impl Plugin for PushPlugin {
    fn name(&self) -> &'static str {
        "push"
    }

    fn message(&self, _worker: &Arc<VersionWorker>, message: &Message) -> Option<Task<Vec<Value>>> {
        if message.command() != Some("push") {
            return None;
        }
        self.hub.subscribe(message.reply.clone());
        Some(ready(Vec::new()))
    }

    fn push(&self, worker: &Arc<VersionWorker>, payload: &Value) {
        let delivered = self.hub.deliver(payload);
        worker
            .logger()
            .debug(format!("push delivered to {} subscriber(s)", delivered));

        if self.config.show_notifications {
            if let Some(event) = notification(payload) {
                self.hub.notify(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryCacheStorage, MemoryOrigin};
    use crate::cache::{CacheFacade, FetchFacade};
    use crate::log::Logger;
    use crate::worker::{factory, PluginFactory};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn worker(raw: &str, hub: &Arc<PushHub>) -> Arc<VersionWorker> {
        let hub = Arc::clone(hub);
        let factories: Vec<PluginFactory> =
            vec![factory(move |m: &Manifest| PushPlugin::new(m, Arc::clone(&hub)))];
        VersionWorker::new(
            Arc::new(Manifest::parse(raw).unwrap()),
            CacheFacade::new(Arc::new(MemoryCacheStorage::new())),
            FetchFacade::new(Arc::new(MemoryOrigin::new()), "bust"),
            &factories,
            Logger::new(10),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn subscribers_receive_payloads() {
        let hub = Arc::new(PushHub::new());
        let worker = worker("{}", &hub);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let replies = worker
            .message(&Message::new(json!({"cmd": "push"}), tx))
            .await
            .unwrap();
        assert!(replies.is_empty());
        assert_eq!(hub.subscriber_count(), 1);

        worker.push(&json!({"data": 1}));
        assert_eq!(rx.recv().await.unwrap(), json!({"data": 1}));
    }

    #[tokio::test]
    async fn closed_subscribers_are_dropped() {
        let hub = Arc::new(PushHub::new());
        let (tx, rx) = mpsc::unbounded_channel();
        hub.subscribe(tx);
        drop(rx);

        assert_eq!(hub.deliver(&json!({})), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn notifications_only_when_enabled() {
        let hub = Arc::new(PushHub::new());
        let mut events = hub.notifications();
        let payload = json!({"notification": {"title": "Hi", "body": "There"}});

        worker("{}", &hub).push(&payload);
        assert!(events.try_recv().is_err());

        worker(r#"{"push": {"showNotifications": true}}"#, &hub).push(&payload);
        assert_eq!(
            events.try_recv().unwrap(),
            PushEvent::Notification {
                title: "Hi".to_string(),
                body: "There".to_string()
            }
        );
    }
}
