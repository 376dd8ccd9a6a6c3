//! The id-sync handshake every subscriber performs after connecting.

use relay_core::wire::{ClientResponse, GET_PERSISTENT_IDS};
use relay_core::{NotificationEvent, PersistentId, RelayError};
use serde::Serialize;

use crate::buffer::NotificationBuffer;
use crate::hub::HubHandle;
use crate::ledger::DedupLedger;

/// Whether the upstream listener has been started. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    #[default]
    NotStarted,
    Running,
}

/// Per-subscriber handshake progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    AwaitingIdSync,
    Synced,
}

/// Starts the upstream listener. Called at most once per process, from the
/// hub's coordination task, so implementations must not block.
pub trait ListenerLauncher: Send + Sync {
    fn launch(&self, hub: HubHandle);
}

/// Validate a subscriber response against the session's phase.
///
/// Returns the reported id list for a successful sync; anything else is a
/// protocol error that the caller logs and ignores.
pub fn interpret(
    phase: &mut SessionPhase,
    response: ClientResponse,
) -> Result<Vec<PersistentId>, RelayError> {
    if !response.success {
        return Err(RelayError::Protocol(format!(
            "subscriber reported failure for request '{}'",
            response.request
        )));
    }
    if response.request != GET_PERSISTENT_IDS {
        return Err(RelayError::Protocol(format!(
            "unhandled request '{}'",
            response.request
        )));
    }
    if *phase == SessionPhase::Synced {
        return Err(RelayError::Protocol("persistent ids already synced".into()));
    }
    *phase = SessionPhase::Synced;
    Ok(response.response.into_iter().map(PersistentId::from).collect())
}

/// What the hub must do after a subscriber's id sync.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    StartListener,
    Flush(Vec<NotificationEvent>),
    Idle,
}

/// Apply a completed id sync to the process-wide state.
pub(crate) fn complete_sync(
    ledger: &mut DedupLedger,
    buffer: &mut NotificationBuffer,
    listener: &mut ListenerState,
    ids: Vec<PersistentId>,
) -> SyncOutcome {
    ledger.replace(ids);
    match *listener {
        ListenerState::NotStarted => {
            *listener = ListenerState::Running;
            SyncOutcome::StartListener
        }
        ListenerState::Running if !buffer.is_empty() => SyncOutcome::Flush(buffer.drain()),
        ListenerState::Running => SyncOutcome::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sync_response(ids: &[&str]) -> ClientResponse {
        ClientResponse {
            request: GET_PERSISTENT_IDS.into(),
            success: true,
            response: ids.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn successful_sync_moves_to_synced() {
        let mut phase = SessionPhase::default();
        let ids = interpret(&mut phase, sync_response(&["a", "b"])).unwrap();
        assert_eq!(ids, vec![PersistentId::from("a"), PersistentId::from("b")]);
        assert_eq!(phase, SessionPhase::Synced);
    }

    #[test]
    fn failure_response_is_protocol_error() {
        let mut phase = SessionPhase::default();
        let mut resp = sync_response(&[]);
        resp.success = false;
        let err = interpret(&mut phase, resp).unwrap_err();
        assert!(matches!(err, RelayError::Protocol(_)));
        assert_eq!(phase, SessionPhase::AwaitingIdSync);
    }

    #[test]
    fn unknown_request_is_protocol_error() {
        let mut phase = SessionPhase::default();
        let mut resp = sync_response(&["a"]);
        resp.request = "get-something-else".into();
        assert!(interpret(&mut phase, resp).is_err());
        assert_eq!(phase, SessionPhase::AwaitingIdSync);
    }

    #[test]
    fn second_sync_is_ignored() {
        let mut phase = SessionPhase::default();
        let _ = interpret(&mut phase, sync_response(&["a"])).unwrap();
        assert!(interpret(&mut phase, sync_response(&["b"])).is_err());
    }

    #[test]
    fn first_sync_starts_listener() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();
        let mut listener = ListenerState::NotStarted;

        let out = complete_sync(&mut ledger, &mut buffer, &mut listener, vec!["a".into(), "b".into()]);
        assert_eq!(out, SyncOutcome::StartListener);
        assert_eq!(listener, ListenerState::Running);
        assert_eq!(ledger.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn later_sync_flushes_buffer() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();
        buffer.push(NotificationEvent::new("e1", BTreeMap::new()));
        buffer.push(NotificationEvent::new("e2", BTreeMap::new()));
        let mut listener = ListenerState::Running;

        match complete_sync(&mut ledger, &mut buffer, &mut listener, Vec::new()) {
            SyncOutcome::Flush(events) => {
                assert_eq!(events.len(), 2);
                assert_eq!(events[0].persistent_id.as_str(), "e1");
                assert_eq!(events[1].persistent_id.as_str(), "e2");
            }
            other => panic!("expected flush, got {other:?}"),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn later_sync_with_empty_buffer_is_idle() {
        let mut ledger = DedupLedger::new();
        let mut buffer = NotificationBuffer::new();
        let mut listener = ListenerState::Running;

        let out = complete_sync(&mut ledger, &mut buffer, &mut listener, vec!["z".into()]);
        assert_eq!(out, SyncOutcome::Idle);
        assert!(!ledger.record(&"z".into()));
    }
}
