//! # redb-backed Object Storage
//!
//! Disk-backed object store on the redb embedded database. Every save,
//! destroy and Oid assignment runs in its own ACID write transaction, so a
//! reopened store sees exactly the committed state.

use super::{ObjectRecord, ObjectStore};
use crate::primitives::FIRST_OID;
use crate::{MnemoError, Oid};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for objects: Oid(u64) -> postcard-encoded ObjectRecord
const OBJECTS: TableDefinition<u64, &[u8]> = TableDefinition::new("objects");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_OID_KEY: &str = "next_oid";

fn io_error(e: impl std::fmt::Display) -> MnemoError {
    MnemoError::IoError(e.to_string())
}

/// A disk-backed object store using redb.
pub struct RedbStore {
    db: Database,
    /// Cached copy of the persisted Oid counter.
    next_oid: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_oid", &self.next_oid)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create an object database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MnemoError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        {
            let write_txn = db.begin_write().map_err(io_error)?;
            let _ = write_txn.open_table(OBJECTS).map_err(io_error)?;
            let _ = write_txn.open_table(METADATA).map_err(io_error)?;
            write_txn.commit().map_err(io_error)?;
        }

        let next_oid = {
            let read_txn = db.begin_read().map_err(io_error)?;
            let table = read_txn.open_table(METADATA).map_err(io_error)?;
            table
                .get(NEXT_OID_KEY)
                .map_err(io_error)?
                .map(|v| v.value())
                .unwrap_or(FIRST_OID)
        };

        tracing::debug!(path = %path.as_ref().display(), next_oid, "opened object store");
        Ok(Self { db, next_oid })
    }

    fn persist_next_oid(&self, next: u64) -> Result<(), MnemoError> {
        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_error)?;
            meta_table.insert(NEXT_OID_KEY, next).map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;
        Ok(())
    }
}

// =============================================================================
// OBJECTSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl ObjectStore for RedbStore {
    fn load_object(&self, oid: Oid) -> Result<Option<ObjectRecord>, MnemoError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let objects_table = read_txn.open_table(OBJECTS).map_err(io_error)?;

        match objects_table.get(oid.0).map_err(io_error)? {
            Some(data) => {
                let record: ObjectRecord = postcard::from_bytes(data.value())
                    .map_err(|e| MnemoError::SerializationError(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn next_assigned_oid(&mut self) -> Result<Oid, MnemoError> {
        let oid = Oid(self.next_oid);
        let next = self.next_oid.saturating_add(1);
        self.persist_next_oid(next)?;
        self.next_oid = next;
        Ok(oid)
    }

    fn save_object(&mut self, record: &ObjectRecord) -> Result<(), MnemoError> {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| MnemoError::SerializationError(e.to_string()))?;
        let next = self.next_oid.max(record.oid.0.saturating_add(1));

        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut objects_table = write_txn.open_table(OBJECTS).map_err(io_error)?;
            objects_table
                .insert(record.oid.0, bytes.as_slice())
                .map_err(io_error)?;
        }
        if next != self.next_oid {
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_error)?;
            meta_table.insert(NEXT_OID_KEY, next).map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;

        self.next_oid = next;
        Ok(())
    }

    fn destroy_object(&mut self, oid: Oid) -> Result<bool, MnemoError> {
        let write_txn = self.db.begin_write().map_err(io_error)?;
        let existed = {
            let mut objects_table = write_txn.open_table(OBJECTS).map_err(io_error)?;
            let removed = objects_table.remove(oid.0).map_err(io_error)?;
            removed.is_some()
        };
        write_txn.commit().map_err(io_error)?;
        Ok(existed)
    }

    fn contains(&self, oid: Oid) -> Result<bool, MnemoError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let objects_table = read_txn.open_table(OBJECTS).map_err(io_error)?;
        let found = objects_table.get(oid.0).map_err(io_error)?.is_some();
        Ok(found)
    }

    fn object_count(&self) -> Result<usize, MnemoError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let objects_table = read_txn.open_table(OBJECTS).map_err(io_error)?;
        let count = objects_table.len().map_err(io_error)?;
        usize::try_from(count).map_err(io_error)
    }

    fn oids(&self) -> Result<Vec<Oid>, MnemoError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let objects_table = read_txn.open_table(OBJECTS).map_err(io_error)?;
        let mut oids = Vec::new();
        for entry in objects_table.iter().map_err(io_error)? {
            let (key, _) = entry.map_err(io_error)?;
            oids.push(Oid(key.value()));
        }
        Ok(oids)
    }
}
