use std::collections::HashSet;

use relay_core::PersistentId;

/// Persistent ids already seen.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<PersistentId>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` unless already present. Returns true if it was new.
    pub fn record(&mut self, id: &PersistentId) -> bool {
        self.seen.insert(id.clone())
    }

    /// Replace the whole ledger with a subscriber's authoritative list.
    pub fn replace(&mut self, ids: Vec<PersistentId>) {
        self.seen = ids.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<PersistentId> {
        raw.iter().map(|s| PersistentId::from(*s)).collect()
    }

    #[test]
    fn record_adds_once() {
        let mut ledger = DedupLedger::new();
        assert!(ledger.record(&"a".into()));
        assert!(ledger.record(&"b".into()));
        assert!(!ledger.record(&"a".into()));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn replace_overwrites() {
        let mut ledger = DedupLedger::new();
        let _ = ledger.record(&"old".into());
        ledger.replace(ids(&["a", "b", "a"]));

        assert_eq!(ledger.len(), 2);
        assert!(!ledger.record(&"a".into()));
        assert!(ledger.record(&"old".into()));
    }

    #[test]
    fn replace_with_empty_list_forgets_everything() {
        let mut ledger = DedupLedger::new();
        let _ = ledger.record(&"a".into());
        ledger.replace(Vec::new());
        assert_eq!(ledger.len(), 0);
        assert!(ledger.record(&"a".into()));
    }
}
