use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::{Notification, NotificationPayload};

/// Identifier the upstream provider assigns to each delivered message.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistentId(String);

impl PersistentId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PersistentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PersistentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A notification received from the upstream push listener.
///
/// The payload is an opaque string map; the relay never inspects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub persistent_id: PersistentId,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl NotificationEvent {
    pub fn new(persistent_id: impl Into<PersistentId>, data: BTreeMap<String, String>) -> Self {
        Self {
            persistent_id: persistent_id.into(),
            data,
        }
    }

    /// Build the subscriber-facing wire message for this event.
    pub fn to_payload(&self) -> NotificationPayload {
        NotificationPayload {
            notification: Notification {
                data: self.data.clone(),
            },
            persistent_id: self.persistent_id.as_str().to_owned(),
        }
    }

    /// Serialize to the JSON frame sent to subscribers.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, pairs: &[(&str, &str)]) -> NotificationEvent {
        let data = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        NotificationEvent::new(id, data)
    }

    #[test]
    fn frame_matches_subscriber_format() {
        let evt = event("0:123%abc", &[("title", "hi"), ("body", "there")]);
        let json: serde_json::Value = serde_json::from_str(&evt.to_frame().unwrap()).unwrap();
        assert_eq!(json["persistentId"], "0:123%abc");
        assert_eq!(json["notification"]["data"]["title"], "hi");
        assert_eq!(json["notification"]["data"]["body"], "there");
    }

    #[test]
    fn empty_payload_still_has_data_object() {
        let evt = event("a", &[]);
        let json: serde_json::Value = serde_json::from_str(&evt.to_frame().unwrap()).unwrap();
        assert!(json["notification"]["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn parses_listener_line() {
        let line = r#"{"persistentId":"p1","data":{"k":"v"}}"#;
        let evt: NotificationEvent = serde_json::from_str(line).unwrap();
        assert_eq!(evt.persistent_id.as_str(), "p1");
        assert_eq!(evt.data.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn listener_line_without_data_defaults_empty() {
        let evt: NotificationEvent = serde_json::from_str(r#"{"persistentId":"p2"}"#).unwrap();
        assert!(evt.data.is_empty());
    }

    #[test]
    fn persistent_id_conversions() {
        let a: PersistentId = "x".into();
        let b: PersistentId = String::from("x").into();
        assert_eq!(a, b);
        assert_eq!(a.into_inner(), "x");
    }
}
