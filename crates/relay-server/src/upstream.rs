//! Lazy upstream startup: credentials, registration, listener connect.

use std::path::PathBuf;
use std::sync::Arc;

use relay_core::device::{AppConfig, DeviceCredentials};
use relay_core::upstream::{DeviceRegistrar, PushListener};
use relay_core::wire::{self, CredentialsPayload};
use relay_core::RelayError;
use relay_store::{write_legacy_token, CredentialStore};
use tokio::sync::mpsc;

use crate::bootstrap::ListenerLauncher;
use crate::hub::HubHandle;
use crate::pipeline;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Collaborators the upstream startup needs.
pub struct UpstreamParts {
    pub app: AppConfig,
    pub store: Arc<dyn CredentialStore>,
    pub registrar: Arc<dyn DeviceRegistrar>,
    pub listener: Arc<dyn PushListener>,
    /// Where to write the legacy single-token file, if at all.
    pub legacy_token_path: Option<PathBuf>,
}

/// Starts the upstream listener on its own task. Fatal startup errors are
/// reported on the channel returned by [`UpstreamLauncher::new`].
pub struct UpstreamLauncher {
    parts: Arc<UpstreamParts>,
    fatal_tx: mpsc::Sender<RelayError>,
}

impl UpstreamLauncher {
    pub fn new(parts: UpstreamParts) -> (Self, mpsc::Receiver<RelayError>) {
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        (
            Self {
                parts: Arc::new(parts),
                fatal_tx,
            },
            fatal_rx,
        )
    }
}

impl ListenerLauncher for UpstreamLauncher {
    fn launch(&self, hub: HubHandle) {
        let parts = Arc::clone(&self.parts);
        let fatal_tx = self.fatal_tx.clone();
        let _ = tokio::spawn(async move {
            if let Err(e) = start_upstream(&parts, hub).await {
                tracing::error!(kind = e.error_kind(), error = %e, "Upstream startup failed");
                let _ = fatal_tx.try_send(e);
            }
        });
    }
}

/// Load cached credentials, or register a new device and announce its token.
async fn resolve_credentials(
    parts: &UpstreamParts,
    hub: &HubHandle,
) -> Result<DeviceCredentials, RelayError> {
    if let Some(creds) = parts.store.load()? {
        tracing::info!("Using cached device credentials");
        return Ok(creds);
    }

    tracing::info!(registrar = parts.registrar.name(), "Registering device");
    let registration = parts.registrar.register(&parts.app).await?;

    match wire::encode(&CredentialsPayload::new(registration.token())) {
        Ok(frame) => {
            let _ = hub.broadcast(frame).await;
        }
        Err(e) => tracing::warn!(error = %e, "Failed to encode credentials message"),
    }

    if let Some(path) = &parts.legacy_token_path {
        if let Err(e) = write_legacy_token(path, registration.token()) {
            tracing::warn!(path = %path.display(), error = %e, "Could not write legacy credential file");
        }
    }

    parts.store.save(&registration.credentials)?;
    Ok(registration.credentials)
}

/// Bring up the upstream side and wire its events into the hub.
pub async fn start_upstream(parts: &UpstreamParts, hub: HubHandle) -> Result<(), RelayError> {
    let credentials = resolve_credentials(parts, &hub).await?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let _bridge = pipeline::spawn_bridge(rx, hub);

    parts
        .listener
        .connect(&parts.app, &credentials, tx)
        .await?;
    tracing::info!(listener = parts.listener.name(), "Upstream listener connected");
    Ok(())
}
