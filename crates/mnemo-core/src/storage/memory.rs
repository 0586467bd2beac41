//! In-memory object store.

use super::{ObjectRecord, ObjectStore};
use crate::primitives::FIRST_OID;
use crate::{MnemoError, Oid};
use std::collections::BTreeMap;

/// Volatile store backed by a `BTreeMap`.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: BTreeMap<Oid, ObjectRecord>,
    next_oid: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_oid: FIRST_OID,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn load_object(&self, oid: Oid) -> Result<Option<ObjectRecord>, MnemoError> {
        Ok(self.records.get(&oid).cloned())
    }

    fn next_assigned_oid(&mut self) -> Result<Oid, MnemoError> {
        let oid = Oid(self.next_oid);
        self.next_oid = self.next_oid.saturating_add(1);
        Ok(oid)
    }

    fn save_object(&mut self, record: &ObjectRecord) -> Result<(), MnemoError> {
        // Keep the counter ahead of explicitly chosen Oids.
        if record.oid.0 >= self.next_oid {
            self.next_oid = record.oid.0.saturating_add(1);
        }
        self.records.insert(record.oid, record.clone());
        Ok(())
    }

    fn destroy_object(&mut self, oid: Oid) -> Result<bool, MnemoError> {
        Ok(self.records.remove(&oid).is_some())
    }

    fn contains(&self, oid: Oid) -> Result<bool, MnemoError> {
        Ok(self.records.contains_key(&oid))
    }

    fn object_count(&self) -> Result<usize, MnemoError> {
        Ok(self.records.len())
    }

    fn oids(&self) -> Result<Vec<Oid>, MnemoError> {
        Ok(self.records.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oids_are_never_reused() {
        let mut store = MemoryStore::new();
        let a = store.next_assigned_oid().expect("oid");
        store
            .save_object(&ObjectRecord::new(a, "Person"))
            .expect("save");
        assert!(store.destroy_object(a).expect("destroy"));

        let b = store.next_assigned_oid().expect("oid");
        assert_ne!(a, b);
        assert_eq!(a, Oid(FIRST_OID));
    }

    #[test]
    fn explicit_oids_advance_the_counter() {
        let mut store = MemoryStore::new();
        store
            .save_object(&ObjectRecord::new(Oid(17), "Person"))
            .expect("save");
        assert_eq!(store.next_assigned_oid().expect("oid"), Oid(18));
    }

    #[test]
    fn destroy_missing_reports_false() {
        let mut store = MemoryStore::new();
        assert!(!store.destroy_object(Oid(3)).expect("destroy"));
        assert_eq!(store.load_object(Oid(3)).expect("load"), None);
        assert_eq!(store.object_count().expect("count"), 0);
    }
}
