//! Per-connection session: one delivery loop, one inbound loop.

use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use relay_core::wire::ClientResponse;
use relay_core::{RelayError, SubscriberId};

use crate::bootstrap::{self, SessionPhase};
use crate::hub::HubHandle;
use crate::registry::Subscriber;

/// Session settings taken from the server config.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub queue_capacity: usize,
    pub heartbeat_interval: Duration,
}

/// Drive a subscriber connection until it fails, then unregister it.
pub async fn handle_ws_connection(socket: WebSocket, hub: HubHandle, options: SessionOptions) {
    let (subscriber, mut rx) = Subscriber::channel(options.queue_capacity);
    let subscriber_id = subscriber.id.clone();
    if !hub.register(subscriber).await {
        tracing::warn!(subscriber_id = %subscriber_id, "Hub unavailable, dropping connection");
        return;
    }
    tracing::info!(subscriber_id = %subscriber_id, "WebSocket client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: drain the outbound queue one frame at a time, plus periodic ping.
    let writer_id = subscriber_id.clone();
    let heartbeat = options.heartbeat_interval.max(Duration::from_secs(1));
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                        let err = RelayError::Connection(e.to_string());
                        tracing::info!(subscriber_id = %writer_id, error = %err, "Write failed");
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(subscriber_id = %writer_id, "Sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    // Reader: parse responses and hand them to the bootstrap coordinator.
    let reader_id = subscriber_id.clone();
    let reader_hub = hub.clone();
    let mut reader = tokio::spawn(async move {
        let mut phase = SessionPhase::default();
        while let Some(msg) = ws_rx.next().await {
            let raw = match msg {
                Ok(WsMessage::Text(text)) => text.as_str().as_bytes().to_vec(),
                Ok(WsMessage::Binary(bytes)) => bytes.to_vec(),
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::info!(subscriber_id = %reader_id, error = %e, "Read failed");
                    break;
                }
            };
            if !handle_frame(&reader_hub, &reader_id, &mut phase, &raw).await {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => {}
    }

    let _ = hub.unregister(subscriber_id.clone()).await;
    tracing::info!(subscriber_id = %subscriber_id, "WebSocket client disconnected");
}

/// Handle one inbound frame. Returns false when the session must end.
async fn handle_frame(
    hub: &HubHandle,
    subscriber_id: &SubscriberId,
    phase: &mut SessionPhase,
    raw: &[u8],
) -> bool {
    let response: ClientResponse = match serde_json::from_slice(raw) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(subscriber_id = %subscriber_id, error = %e, "Malformed response, closing connection");
            return false;
        }
    };

    match bootstrap::interpret(phase, response) {
        Ok(ids) => hub.sync_ids(subscriber_id.clone(), ids).await,
        Err(e) => {
            tracing::warn!(
                subscriber_id = %subscriber_id,
                kind = e.error_kind(),
                error = %e,
                "Ignoring subscriber response"
            );
            true
        }
    }
}
