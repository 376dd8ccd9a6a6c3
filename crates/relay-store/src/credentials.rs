use std::path::PathBuf;

use parking_lot::Mutex;
use relay_core::device::DeviceCredentials;

use crate::error::StoreError;

/// Get/put persistence for device credentials.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is cached yet.
    fn load(&self) -> Result<Option<DeviceCredentials>, StoreError>;

    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StoreError>;
}

/// Credentials stored as a JSON file (`device.json` by default).
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<DeviceCredentials>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // An unreadable cache means we register again, same as a missing one.
        match serde_json::from_str(&content) {
            Ok(creds) => Ok(Some(creds)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt credential file");
                Ok(None)
            }
        }
    }

    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(credentials)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Saved device credentials");
        Ok(())
    }
}

/// In-memory store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<DeviceCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: DeviceCredentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<DeviceCredentials>, StoreError> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StoreError> {
        *self.inner.lock() = Some(credentials.clone());
        Ok(())
    }
}
