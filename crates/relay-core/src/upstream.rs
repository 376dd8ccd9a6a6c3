use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::device::{AppConfig, DeviceCredentials, Registration};
use crate::errors::UpstreamError;
use crate::events::NotificationEvent;

/// Registers an emulated device with the upstream push service
/// (installation notice, checkin, token registration).
#[async_trait]
pub trait DeviceRegistrar: Send + Sync {
    fn name(&self) -> &str;

    async fn register(&self, app: &AppConfig) -> Result<Registration, UpstreamError>;
}

/// Persistent connection to the push provider.
///
/// `connect` returns once the connection is established; events are then
/// emitted into `events` until the connection ends or the receiver is dropped.
#[async_trait]
pub trait PushListener: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(
        &self,
        app: &AppConfig,
        credentials: &DeviceCredentials,
        events: mpsc::Sender<NotificationEvent>,
    ) -> Result<(), UpstreamError>;
}
