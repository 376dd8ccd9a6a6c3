//! The broadcast hub: a single coordination task owning the registry, the
//! dedup ledger, the notification buffer and the listener state.
//!
//! Every mutation arrives as a [`HubCommand`] on one ordered channel, so
//! operations are linearized without locks. The task only ever waits on
//! that channel; delivery to subscribers uses `try_send` and never blocks.

use std::sync::Arc;

use relay_core::wire::{self, HubRequest};
use relay_core::{NotificationEvent, PersistentId, SubscriberId};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::bootstrap::{self, ListenerLauncher, ListenerState, SyncOutcome};
use crate::buffer::NotificationBuffer;
use crate::ledger::DedupLedger;
use crate::pipeline::{self, Ingest};
use crate::registry::{ConnectionRegistry, Subscriber};

/// Requests handled by the hub's coordination task.
#[derive(Debug)]
pub enum HubCommand {
    Register(Subscriber),
    Unregister(SubscriberId),
    Broadcast(String),
    Ingest(NotificationEvent),
    SyncIds {
        from: SubscriberId,
        ids: Vec<PersistentId>,
    },
    Stats(oneshot::Sender<HubStats>),
}

/// Point-in-time view of the hub, served on `/health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub subscribers: usize,
    pub listener: ListenerState,
    pub ledger_size: usize,
    pub buffered: usize,
}

/// Cloneable handle for sending requests to the hub.
///
/// Every method returns false (or `None`) once the hub task has stopped.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn send(&self, command: HubCommand) -> bool {
        self.tx.send(command).await.is_ok()
    }

    pub async fn register(&self, subscriber: Subscriber) -> bool {
        self.send(HubCommand::Register(subscriber)).await
    }

    pub async fn unregister(&self, id: SubscriberId) -> bool {
        self.send(HubCommand::Unregister(id)).await
    }

    /// Deliver a serialized frame to every registered subscriber.
    pub async fn broadcast(&self, frame: String) -> bool {
        self.send(HubCommand::Broadcast(frame)).await
    }

    /// Feed an upstream notification through the dedup/buffer pipeline.
    pub async fn ingest(&self, event: NotificationEvent) -> bool {
        self.send(HubCommand::Ingest(event)).await
    }

    /// Report a subscriber's completed id sync.
    pub async fn sync_ids(&self, from: SubscriberId, ids: Vec<PersistentId>) -> bool {
        self.send(HubCommand::SyncIds { from, ids }).await
    }

    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, rx) = oneshot::channel();
        if !self.send(HubCommand::Stats(reply)).await {
            return None;
        }
        rx.await.ok()
    }
}

struct Hub {
    registry: ConnectionRegistry,
    ledger: DedupLedger,
    buffer: NotificationBuffer,
    listener: ListenerState,
    launcher: Arc<dyn ListenerLauncher>,
    // Weak so the task still stops once every external handle is dropped.
    self_tx: mpsc::WeakSender<HubCommand>,
}

impl Hub {
    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::info!("Hub stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(subscriber) => self.register(subscriber),
            HubCommand::Unregister(id) => {
                if self.registry.remove(&id) {
                    tracing::info!(
                        subscriber_id = %id,
                        subscribers = self.registry.len(),
                        "Subscriber unregistered"
                    );
                }
            }
            HubCommand::Broadcast(frame) => self.broadcast(&frame),
            HubCommand::Ingest(event) => self.ingest(event),
            HubCommand::SyncIds { from, ids } => self.sync_ids(&from, ids),
            HubCommand::Stats(reply) => {
                let _ = reply.send(HubStats {
                    subscribers: self.registry.len(),
                    listener: self.listener,
                    ledger_size: self.ledger.len(),
                    buffered: self.buffer.len(),
                });
            }
        }
    }

    fn register(&mut self, subscriber: Subscriber) {
        let id = subscriber.id.clone();
        self.registry.insert(subscriber);
        tracing::info!(
            subscriber_id = %id,
            subscribers = self.registry.len(),
            "Subscriber registered"
        );

        match wire::encode(&HubRequest::get_persistent_ids()) {
            Ok(frame) => {
                if !self.registry.send_to(&id, frame) {
                    tracing::warn!(subscriber_id = %id, "Could not queue persistent id request");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode persistent id request"),
        }
    }

    fn broadcast(&self, frame: &str) {
        let delivery = self.registry.broadcast(frame);
        tracing::debug!(
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Broadcast frame"
        );
    }

    fn deliver(&self, event: &NotificationEvent) {
        match event.to_frame() {
            Ok(frame) => self.broadcast(&frame),
            Err(e) => tracing::warn!(
                persistent_id = %event.persistent_id,
                error = %e,
                "Failed to serialize notification"
            ),
        }
    }

    fn ingest(&mut self, event: NotificationEvent) {
        let persistent_id = event.persistent_id.clone();
        match pipeline::ingest(
            &mut self.ledger,
            &mut self.buffer,
            self.registry.is_empty(),
            event,
        ) {
            Ingest::Duplicate => {
                tracing::debug!(persistent_id = %persistent_id, "Already received, skipping");
            }
            Ingest::Buffered => {
                tracing::info!(
                    persistent_id = %persistent_id,
                    buffered = self.buffer.len(),
                    "Queued notification"
                );
            }
            Ingest::Deliver(event) => {
                tracing::info!(persistent_id = %persistent_id, "Relaying notification");
                self.deliver(&event);
            }
        }
    }

    fn sync_ids(&mut self, from: &SubscriberId, ids: Vec<PersistentId>) {
        tracing::info!(subscriber_id = %from, count = ids.len(), "Received persistent ids");
        match bootstrap::complete_sync(&mut self.ledger, &mut self.buffer, &mut self.listener, ids) {
            SyncOutcome::StartListener => match self.self_tx.upgrade() {
                Some(tx) => {
                    tracing::info!("Starting upstream listener");
                    self.launcher.launch(HubHandle { tx });
                }
                None => tracing::warn!("Hub is shutting down, not starting upstream listener"),
            },
            SyncOutcome::Flush(events) => {
                tracing::info!(count = events.len(), "Clearing queue");
                for event in &events {
                    self.deliver(event);
                }
                tracing::info!("Queue cleared");
            }
            SyncOutcome::Idle => {}
        }
    }
}

/// Spawn the hub's coordination task.
pub fn spawn_hub(
    launcher: Arc<dyn ListenerLauncher>,
    capacity: usize,
) -> (HubHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let hub = Hub {
        registry: ConnectionRegistry::new(),
        ledger: DedupLedger::new(),
        buffer: NotificationBuffer::new(),
        listener: ListenerState::NotStarted,
        launcher,
        self_tx: tx.downgrade(),
    };
    let task = tokio::spawn(hub.run(rx));
    (HubHandle { tx }, task)
}
