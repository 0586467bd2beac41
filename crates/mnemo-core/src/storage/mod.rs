//! # Object Storage
//!
//! The persistence collaborator: records keyed by [`Oid`], plus the Oid
//! counter. The engine never touches storage directly; the
//! [`Session`](crate::session::Session) translates between stored records and
//! adapters.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::{MnemoError, Oid, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored association target.
///
/// The type travels with the Oid so a target can be materialized as a
/// placeholder even after its own record is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub oid: Oid,
    pub type_name: String,
}

impl RecordRef {
    #[must_use]
    pub fn new(oid: Oid, type_name: impl Into<String>) -> Self {
        Self {
            oid,
            type_name: type_name.into(),
        }
    }
}

/// Stored form of one persistent object.
///
/// Associations are stored by Oid; the session rebuilds them as ghosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub oid: Oid,
    pub type_name: String,
    pub values: BTreeMap<String, Value>,
    pub references: BTreeMap<String, Option<RecordRef>>,
    pub collections: BTreeMap<String, Vec<RecordRef>>,
}

impl ObjectRecord {
    #[must_use]
    pub fn new(oid: Oid, type_name: impl Into<String>) -> Self {
        Self {
            oid,
            type_name: type_name.into(),
            values: BTreeMap::new(),
            references: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_reference(mut self, field: impl Into<String>, target: Option<RecordRef>) -> Self {
        self.references.insert(field.into(), target);
        self
    }

    #[must_use]
    pub fn with_collection(mut self, field: impl Into<String>, elements: Vec<RecordRef>) -> Self {
        self.collections.insert(field.into(), elements);
        self
    }
}

/// Persistence backend for object records.
pub trait ObjectStore: std::fmt::Debug {
    /// Stored record for `oid`, or `None` if absent (never stored or destroyed).
    fn load_object(&self, oid: Oid) -> Result<Option<ObjectRecord>, MnemoError>;

    /// Hand out a fresh Oid. Never returns the same Oid twice for one store.
    fn next_assigned_oid(&mut self) -> Result<Oid, MnemoError>;

    /// Insert or overwrite the record under `record.oid`.
    fn save_object(&mut self, record: &ObjectRecord) -> Result<(), MnemoError>;

    /// Delete the record; returns whether it existed.
    fn destroy_object(&mut self, oid: Oid) -> Result<bool, MnemoError>;

    fn contains(&self, oid: Oid) -> Result<bool, MnemoError> {
        Ok(self.load_object(oid)?.is_some())
    }

    fn object_count(&self) -> Result<usize, MnemoError>;

    /// All stored Oids in ascending order.
    fn oids(&self) -> Result<Vec<Oid>, MnemoError>;
}
