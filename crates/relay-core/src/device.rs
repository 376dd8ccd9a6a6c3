use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Application data for the upstream push service (sender id, package
/// name, api keys). Read once at startup and handed to collaborators as is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppConfig(pub serde_json::Value);

/// Emulated-device credentials, persisted as an opaque JSON blob.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCredentials(pub serde_json::Value);

impl std::fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeviceCredentials([REDACTED])")
    }
}

/// Result of a fresh device registration.
#[derive(Clone)]
pub struct Registration {
    pub credentials: DeviceCredentials,
    pub push_token: SecretString,
}

impl Registration {
    pub fn new(credentials: DeviceCredentials, push_token: impl Into<String>) -> Self {
        Self {
            credentials,
            push_token: SecretString::from(push_token.into()),
        }
    }

    pub fn token(&self) -> &str {
        self.push_token.expose_secret()
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("push_token", &"[REDACTED]")
            .finish()
    }
}
