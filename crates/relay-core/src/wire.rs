//! JSON messages exchanged with subscribers over the WebSocket.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Request name for the bootstrap id sync.
pub const GET_PERSISTENT_IDS: &str = "get-persistent-ids";

/// Hub → subscriber request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubRequest {
    pub request: String,
}

impl HubRequest {
    pub fn get_persistent_ids() -> Self {
        Self {
            request: GET_PERSISTENT_IDS.into(),
        }
    }
}

/// Subscriber → hub response. Missing or `null` fields take their zero values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub request: String,
    #[serde(deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub response: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub data: BTreeMap<String, String>,
}

/// Hub → subscriber notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub notification: Notification,
    #[serde(rename = "persistentId")]
    pub persistent_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
}

/// `{"fcm": {"token": ...}}`, shared by the credentials message and the
/// legacy credential file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcmToken {
    pub fcm: TokenEntry,
}

impl FcmToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            fcm: TokenEntry {
                token: token.into(),
            },
        }
    }
}

/// Hub → subscriber credentials, sent after a fresh device registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsPayload {
    pub credentials: FcmToken,
}

impl CredentialsPayload {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credentials: FcmToken::new(token),
        }
    }
}

/// Serialize any wire message to a text frame.
pub fn encode<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
