use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use relay_core::device::{AppConfig, DeviceCredentials, Registration};
use relay_core::upstream::{DeviceRegistrar, PushListener};
use relay_core::{NotificationEvent, UpstreamError};

/// Registrar returning a pre-programmed result.
pub struct MockRegistrar {
    result: Result<Registration, UpstreamError>,
    call_count: AtomicUsize,
}

impl MockRegistrar {
    pub fn succeeding(token: &str) -> Self {
        Self {
            result: Ok(Registration::new(
                DeviceCredentials(serde_json::json!({"androidId": 1, "securityToken": 2})),
                token,
            )),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            result: Err(error),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeviceRegistrar for MockRegistrar {
    fn name(&self) -> &str {
        "mock"
    }

    async fn register(&self, _app: &AppConfig) -> Result<Registration, UpstreamError> {
        let _ = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.result.clone()
    }
}

/// Listener that emits scripted events on connect and lets tests push
/// more through [`MockListener::emit`].
pub struct MockListener {
    initial: Vec<NotificationEvent>,
    failure: Option<UpstreamError>,
    sink: Mutex<Option<mpsc::Sender<NotificationEvent>>>,
    connect_count: AtomicUsize,
    connected: Notify,
}

impl MockListener {
    pub fn new(initial: Vec<NotificationEvent>) -> Self {
        Self {
            initial,
            failure: None,
            sink: Mutex::new(None),
            connect_count: AtomicUsize::new(0),
            connected: Notify::new(),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Resolves once `connect` has been called.
    pub async fn wait_connected(&self) {
        if self.connect_count() > 0 {
            return;
        }
        self.connected.notified().await;
    }

    /// Emit an event as if it came from upstream. Returns false before
    /// `connect` or after the receiver is gone.
    pub async fn emit(&self, event: NotificationEvent) -> bool {
        let sink = self.sink.lock().clone();
        match sink {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl PushListener for MockListener {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(
        &self,
        _app: &AppConfig,
        _credentials: &DeviceCredentials,
        events: mpsc::Sender<NotificationEvent>,
    ) -> Result<(), UpstreamError> {
        let _ = self.connect_count.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = &self.failure {
            self.connected.notify_one();
            return Err(err.clone());
        }
        for event in &self.initial {
            if events.send(event.clone()).await.is_err() {
                break;
            }
        }
        *self.sink.lock() = Some(events);
        self.connected.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn registrar_counts_calls() {
        let registrar = MockRegistrar::succeeding("tok");
        let reg = registrar.register(&AppConfig::default()).await.unwrap();
        assert_eq!(reg.token(), "tok");
        assert_eq!(registrar.call_count(), 1);

        let failing = MockRegistrar::failing(UpstreamError::Rejected("no".into()));
        assert!(failing.register(&AppConfig::default()).await.is_err());
        assert_eq!(failing.call_count(), 1);
    }

    #[tokio::test]
    async fn listener_emits_initial_then_pushed_events() {
        let listener = MockListener::new(vec![NotificationEvent::new("a", BTreeMap::new())]);
        assert!(!listener.emit(NotificationEvent::new("early", BTreeMap::new())).await);

        let (tx, mut rx) = mpsc::channel(8);
        listener
            .connect(&AppConfig::default(), &DeviceCredentials(serde_json::json!({})), tx)
            .await
            .unwrap();
        listener.wait_connected().await;
        assert_eq!(listener.connect_count(), 1);

        assert!(listener.emit(NotificationEvent::new("b", BTreeMap::new())).await);
        assert_eq!(rx.recv().await.unwrap().persistent_id.as_str(), "a");
        assert_eq!(rx.recv().await.unwrap().persistent_id.as_str(), "b");
    }

    #[tokio::test]
    async fn failing_listener() {
        let listener = MockListener::failing(UpstreamError::Rejected("auth".into()));
        let (tx, _rx) = mpsc::channel(1);
        let result = listener
            .connect(&AppConfig::default(), &DeviceCredentials(serde_json::json!({})), tx)
            .await;
        assert!(result.is_err());
        assert_eq!(listener.connect_count(), 1);
    }
}
