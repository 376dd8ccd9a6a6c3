//! Dedup → buffer-or-deliver for upstream notifications.

use relay_core::NotificationEvent;
use tokio::sync::mpsc;

use crate::buffer::NotificationBuffer;
use crate::hub::HubHandle;
use crate::ledger::DedupLedger;

/// What happened to one upstream event.
#[derive(Debug, PartialEq, Eq)]
pub enum Ingest {
    /// Persistent id already in the ledger.
    Duplicate,
    /// Held in the buffer until a subscriber completes bootstrap.
    Buffered,
    /// Should be broadcast now.
    Deliver(NotificationEvent),
}

/// Run one event through the pipeline.
///
/// Only an empty registry buffers. Once anyone is registered, new events are
/// delivered live even if older ones still wait for a completed bootstrap.
pub fn ingest(
    ledger: &mut DedupLedger,
    buffer: &mut NotificationBuffer,
    registry_empty: bool,
    event: NotificationEvent,
) -> Ingest {
    if !ledger.record(&event.persistent_id) {
        return Ingest::Duplicate;
    }
    if registry_empty {
        buffer.push(event);
        return Ingest::Buffered;
    }
    Ingest::Deliver(event)
}

/// Forward events from the upstream listener's channel into the hub.
pub fn spawn_bridge(
    mut rx: mpsc::Receiver<NotificationEvent>,
    hub: HubHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !hub.ingest(event).await {
                tracing::info!("Hub stopped, closing event bridge");
                return;
            }
        }
        tracing::info!("Upstream event channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event(id: &str) -> NotificationEvent {
        NotificationEvent::new(id, BTreeMap::new())
    }

    #[test]
    fn new_event_with_subscribers_is_delivered() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();

        let out = ingest(&mut ledger, &mut buffer, false, event("a"));
        assert_eq!(out, Ingest::Deliver(event("a")));
        assert!(!ledger.record(&"a".into()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn new_event_without_subscribers_is_buffered() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();

        assert_eq!(ingest(&mut ledger, &mut buffer, true, event("a")), Ingest::Buffered);
        assert_eq!(buffer.len(), 1);
        assert!(!ledger.record(&"a".into()));
    }

    #[test]
    fn known_id_is_dropped_everywhere() {
        let mut ledger = DedupLedger::new();
        ledger.replace(vec!["a".into()]);
        let mut buffer = NotificationBuffer::new();

        assert_eq!(ingest(&mut ledger, &mut buffer, true, event("a")), Ingest::Duplicate);
        assert_eq!(ingest(&mut ledger, &mut buffer, false, event("a")), Ingest::Duplicate);
        assert!(buffer.is_empty());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn second_copy_of_same_id_is_dropped() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();

        assert_eq!(ingest(&mut ledger, &mut buffer, true, event("x")), Ingest::Buffered);
        assert_eq!(ingest(&mut ledger, &mut buffer, false, event("x")), Ingest::Duplicate);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn registered_subscriber_gets_live_events_while_buffer_waits() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();

        assert_eq!(ingest(&mut ledger, &mut buffer, true, event("e1")), Ingest::Buffered);
        // A subscriber registered but has not finished bootstrap yet.
        assert_eq!(
            ingest(&mut ledger, &mut buffer, false, event("e2")),
            Ingest::Deliver(event("e2"))
        );

        let order: Vec<_> = buffer
            .drain()
            .into_iter()
            .map(|e| e.persistent_id.into_inner())
            .collect();
        assert_eq!(order, vec!["e1"]);
    }
}
