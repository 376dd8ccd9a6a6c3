use std::fmt;

use uuid::Uuid;

/// Identifies one connected subscriber, e.g. `sub_0190...`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(format!("sub_{}", Uuid::now_v7()))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_id_has_prefix() {
        let id = SubscriberId::new();
        assert!(id.to_string().starts_with("sub_"), "got: {id}");
    }

    #[test]
    fn ids_are_unique() {
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        assert_ne!(a, b);
    }
}
