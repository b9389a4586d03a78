//! Lifecycle event loop
//!
//! Events arrive on a channel, each carrying whatever the sender needs to
//! hear back on. Install and activate are handled one at a time in arrival
//! order; fetches, messages and pushes each get their own task and never
//! wait behind a lifecycle step.

use crate::adapter::{Request, Response};
use crate::driver::{Driver, DriverStatus};
use crate::error::WorkerResult;
use crate::worker::Message;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::debug;

/// Something the host platform asks the driver to do
pub enum LifecycleEvent {
    Install(oneshot::Sender<WorkerResult<DriverStatus>>),
    Activate(oneshot::Sender<WorkerResult<DriverStatus>>),
    Fetch {
        request: Request,
        respond: oneshot::Sender<Response>,
    },
    Message(Message),
    Push(Value),
}

impl LifecycleEvent {
    /// Install event and the receiver its outcome arrives on
    pub fn install() -> (Self, oneshot::Receiver<WorkerResult<DriverStatus>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Install(tx), rx)
    }

    /// Activate event and the receiver its outcome arrives on
    pub fn activate() -> (Self, oneshot::Receiver<WorkerResult<DriverStatus>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Activate(tx), rx)
    }

    /// Fetch event and the receiver its response arrives on
    pub fn fetch(request: Request) -> (Self, oneshot::Receiver<Response>) {
        let (respond, rx) = oneshot::channel();
        (Self::Fetch { request, respond }, rx)
    }

    fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Install(_) | Self::Activate(_))
    }
}

impl Driver {
    /// Handle events until the channel closes, then wait for outstanding
    /// work including background operations
    pub async fn serve(self: Arc<Self>, mut events: mpsc::Receiver<LifecycleEvent>) {
        let (lifecycle_tx, mut lifecycle_rx) = mpsc::unbounded_channel::<LifecycleEvent>();
        let sequential = {
            let driver = Arc::clone(&self);
            tokio::spawn(async move {
                while let Some(event) = lifecycle_rx.recv().await {
                    driver.handle(event).await;
                }
            })
        };

        let mut concurrent = JoinSet::new();
        while let Some(event) = events.recv().await {
            if event.is_lifecycle() {
                if lifecycle_tx.send(event).is_err() {
                    debug!("Lifecycle queue closed");
                }
                continue;
            }
            let driver = Arc::clone(&self);
            concurrent.spawn(async move { driver.handle(event).await });
        }

        drop(lifecycle_tx);
        let _ = sequential.await;
        while concurrent.join_next().await.is_some() {}
        self.settle().await;
    }

    async fn handle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Install(done) => {
                let _ = done.send(self.install().await);
            }
            LifecycleEvent::Activate(done) => {
                let _ = done.send(self.activate().await);
            }
            LifecycleEvent::Fetch { request, respond } => {
                let _ = respond.send(self.fetch(&request).await);
            }
            LifecycleEvent::Message(message) => {
                if let Err(e) = self.message(message).await {
                    self.logger().warn(format!("message failed: {}", e));
                }
            }
            LifecycleEvent::Push(payload) => self.push(payload).await,
        }
    }
}
