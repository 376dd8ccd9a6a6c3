use std::collections::HashMap;

use relay_core::SubscriberId;
use tokio::sync::mpsc;

/// Hub-side handle to a subscriber: its id and the sending half of its
/// outbound queue. The session owns the receiving half.
#[derive(Clone, Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub tx: mpsc::Sender<String>,
}

impl Subscriber {
    /// Create a subscriber with a bounded outbound queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                id: SubscriberId::new(),
                tx,
            },
            rx,
        )
    }
}

/// Outcome of a broadcast, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

/// Active subscribers. Owned by the hub's coordination task; never shared.
#[derive(Default)]
pub struct ConnectionRegistry {
    subscribers: HashMap<SubscriberId, mpsc::Sender<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscriber: Subscriber) {
        let _ = self.subscribers.insert(subscriber.id, subscriber.tx);
    }

    /// Idempotent. Returns whether the subscriber was present.
    pub fn remove(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Queue a frame for one subscriber without waiting.
    pub fn send_to(&self, id: &SubscriberId, frame: String) -> bool {
        match self.subscribers.get(id) {
            Some(tx) => try_deliver(id, tx, frame),
            None => false,
        }
    }

    /// Queue a frame for every subscriber. A full queue skips that
    /// subscriber for this frame only.
    pub fn broadcast(&self, frame: &str) -> Delivery {
        let mut delivery = Delivery::default();
        for (id, tx) in &self.subscribers {
            if try_deliver(id, tx, frame.to_owned()) {
                delivery.delivered += 1;
            } else {
                delivery.dropped += 1;
            }
        }
        delivery
    }
}

fn try_deliver(id: &SubscriberId, tx: &mpsc::Sender<String>, frame: String) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(msg)) => {
            tracing::warn!(
                subscriber_id = %id,
                msg_len = msg.len(),
                "Send queue full, dropping message"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!(subscriber_id = %id, "Send queue closed");
            false
        }
    }
}
