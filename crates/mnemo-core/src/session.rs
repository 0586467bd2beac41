//! # Session Module
//!
//! A unit of work: one identity map, one object store, one metamodel.
//!
//! The session is the only component that reads or writes the store. It
//! turns stored records into adapters (associations come back as `GHOST`
//! placeholders and are resolved on demand) and adapters back into records.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore` (fast, volatile)
//! - `Persistent`: `RedbStore` (disk-backed, ACID)
//!
//! ## Hanging references
//!
//! A stored reference whose target record has been destroyed still loads as
//! a `GHOST` carrying the target's Oid. Resolving that placeholder fails with
//! [`MnemoError::UnknownIdentity`] and leaves it in `GHOST`.

use crate::loader::ObjectLoader;
use crate::memento::{LoadedObjects, Memento};
use crate::metamodel::{Metamodel, TypeRegistry};
use crate::resolve::ResolveState;
use crate::space::{Adapter, AdapterView};
use crate::storage::{MemoryStore, ObjectRecord, ObjectStore, RecordRef, RedbStore};
use crate::{AdapterId, FieldKind, MnemoError, Oid, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use tracing::{debug, warn};

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Log a storage error and fall back to the default value.
#[inline]
fn log_and_default<T: Default>(result: Result<T, MnemoError>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!(context, error = %e, "storage error");
            T::default()
        }
    }
}

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory records (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed records using redb (ACID, persistent).
    Persistent(RedbStore),
    /// Any other [`ObjectStore`] implementation.
    Custom(Box<dyn ObjectStore>),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn store(&self) -> &dyn ObjectStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
            Self::Custom(store) => store.as_ref(),
        }
    }

    fn store_mut(&mut self) -> &mut dyn ObjectStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
            Self::Custom(store) => store.as_mut(),
        }
    }
}

// NOTE: Session does not implement Clone; RedbStore holds a database handle.

/// Identity map, object store and metamodel for one unit of work.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
    loader: ObjectLoader,
    metamodel: TypeRegistry,
}

impl Session {
    /// Session over a fresh in-memory store.
    #[must_use]
    pub fn new(metamodel: TypeRegistry) -> Self {
        Self::with_backend(StorageBackend::default(), metamodel)
    }

    /// Session over a redb store at `path`, created if missing.
    pub fn with_redb(path: impl AsRef<Path>, metamodel: TypeRegistry) -> Result<Self, MnemoError> {
        let store = RedbStore::open(path)?;
        Ok(Self::with_backend(StorageBackend::Persistent(store), metamodel))
    }

    #[must_use]
    pub fn with_backend(backend: StorageBackend, metamodel: TypeRegistry) -> Self {
        Self {
            backend,
            loader: ObjectLoader::new(),
            metamodel,
        }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn loader(&self) -> &ObjectLoader {
        &self.loader
    }

    #[must_use]
    pub fn metamodel(&self) -> &TypeRegistry {
        &self.metamodel
    }

    /// Adapter registered for `oid` in this session, without loading.
    #[must_use]
    pub fn adapter_for(&self, oid: Oid) -> Option<AdapterId> {
        self.loader.adapter_for(oid)
    }

    // =========================================================================
    // EDITING
    // =========================================================================

    /// New never-persisted object of a known type.
    pub fn create_transient(&mut self, type_name: &str) -> Result<AdapterId, MnemoError> {
        self.metamodel.fields_of(type_name)?;
        let id = self.loader.create_transient(type_name)?;
        debug!(adapter = %id, type_name, "created transient");
        Ok(id)
    }

    pub fn set_value(
        &mut self,
        adapter: AdapterId,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), MnemoError> {
        self.check_writable(adapter, field, FieldKind::Value)?;
        self.loader
            .space_mut()
            .set_value(adapter, field, value.into())
    }

    pub fn set_reference(
        &mut self,
        adapter: AdapterId,
        field: &str,
        target: Option<AdapterId>,
    ) -> Result<(), MnemoError> {
        self.check_writable(adapter, field, FieldKind::OneToOne)?;
        self.loader.space_mut().set_reference(adapter, field, target)
    }

    pub fn push_element(
        &mut self,
        adapter: AdapterId,
        field: &str,
        element: AdapterId,
    ) -> Result<(), MnemoError> {
        self.check_writable(adapter, field, FieldKind::OneToMany)?;
        self.loader.space_mut().push_element(adapter, field, element)
    }

    fn check_writable(&self, adapter: AdapterId, field: &str, kind: FieldKind) -> Result<(), MnemoError> {
        let a = self.loader.adapter(adapter)?;
        if !a.state().is_resolved() {
            return Err(MnemoError::NotResolved {
                adapter,
                state: a.state(),
            });
        }
        self.metamodel.field_of_kind(a.type_name(), field, kind)?;
        Ok(())
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Persist a transient object and every transient object reachable from it.
    ///
    /// Each gets an Oid from the store and moves `TRANSIENT -> RESOLVED`.
    pub fn make_persistent(&mut self, adapter: AdapterId) -> Result<Oid, MnemoError> {
        let state = self.loader.state(adapter)?;
        if state != ResolveState::Transient {
            return Err(MnemoError::InvalidTransition {
                from: state,
                to: ResolveState::Resolved,
            });
        }
        self.persist_from(adapter)
    }

    /// Write a fully resolved object (and newly reachable transients) back.
    ///
    /// Transient objects are made persistent first.
    pub fn save(&mut self, adapter: AdapterId) -> Result<Oid, MnemoError> {
        match self.loader.state(adapter)? {
            ResolveState::Transient => self.make_persistent(adapter),
            ResolveState::Resolved => self.persist_from(adapter),
            state => Err(MnemoError::NotResolved { adapter, state }),
        }
    }

    /// Records are written before any adapter is promoted, so a store error
    /// leaves every transient adapter transient and unbound.
    fn persist_from(&mut self, root: AdapterId) -> Result<Oid, MnemoError> {
        let transients = self.reachable_transients(root)?;
        let mut planned = BTreeMap::new();
        for &id in &transients {
            let oid = self.backend.store_mut().next_assigned_oid()?;
            planned.insert(id, oid);
        }

        let mut to_save = transients;
        if !to_save.contains(&root) {
            to_save.insert(0, root);
        }
        let records = to_save
            .iter()
            .map(|id| self.record_of(*id, &planned))
            .collect::<Result<Vec<_>, _>>()?;
        for record in &records {
            self.backend.store_mut().save_object(record)?;
        }

        for (&id, &oid) in &planned {
            self.loader.make_persistent(id, oid)?;
        }

        let root_oid = self.planned_oid(root, &planned)?;
        debug!(oid = %root_oid, saved = records.len(), "persisted");
        Ok(root_oid)
    }

    /// Oid `id` has, or will have once `planned` is applied.
    fn planned_oid(&self, id: AdapterId, planned: &BTreeMap<AdapterId, Oid>) -> Result<Oid, MnemoError> {
        let adapter = self.loader.adapter(id)?;
        match adapter.oid().or_else(|| planned.get(&id).copied()) {
            Some(oid) => Ok(oid),
            None => Err(MnemoError::NotResolved {
                adapter: id,
                state: adapter.state(),
            }),
        }
    }

    /// Transient adapters reachable from `root` in breadth-first order,
    /// not walking through persistent objects other than the root.
    fn reachable_transients(&self, root: AdapterId) -> Result<Vec<AdapterId>, MnemoError> {
        let mut found = Vec::new();
        let mut visited = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(id) = queue.pop_front() {
            let adapter = self.loader.adapter(id)?;
            if adapter.state() == ResolveState::Transient {
                found.push(id);
            } else if id != root {
                continue;
            }
            for target in self.targets(adapter)? {
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        Ok(found)
    }

    fn targets(&self, adapter: &Adapter) -> Result<Vec<AdapterId>, MnemoError> {
        let mut targets = Vec::new();
        for spec in self.metamodel.fields_of(adapter.type_name())? {
            match spec.kind {
                FieldKind::Value => {}
                FieldKind::OneToOne => targets.extend(adapter.reference(&spec.name)),
                FieldKind::OneToMany => targets.extend_from_slice(adapter.collection(&spec.name)),
            }
        }
        Ok(targets)
    }

    fn record_of(&self, id: AdapterId, planned: &BTreeMap<AdapterId, Oid>) -> Result<ObjectRecord, MnemoError> {
        let adapter = self.loader.adapter(id)?;
        let oid = self.planned_oid(id, planned)?;

        let mut record = ObjectRecord::new(oid, adapter.type_name());
        for spec in self.metamodel.fields_of(adapter.type_name())? {
            match spec.kind {
                FieldKind::Value => {
                    record
                        .values
                        .insert(spec.name.clone(), adapter.value(&spec.name).clone());
                }
                FieldKind::OneToOne => {
                    let target = adapter
                        .reference(&spec.name)
                        .map(|t| self.record_ref(t, planned))
                        .transpose()?;
                    record.references.insert(spec.name.clone(), target);
                }
                FieldKind::OneToMany => {
                    let elements = adapter
                        .collection(&spec.name)
                        .iter()
                        .map(|e| self.record_ref(*e, planned))
                        .collect::<Result<Vec<_>, _>>()?;
                    record.collections.insert(spec.name.clone(), elements);
                }
            }
        }
        Ok(record)
    }

    fn record_ref(&self, id: AdapterId, planned: &BTreeMap<AdapterId, Oid>) -> Result<RecordRef, MnemoError> {
        let oid = self.planned_oid(id, planned)?;
        Ok(RecordRef::new(oid, self.loader.type_name(id)?))
    }

    /// Delete the stored record and drop the session's identity binding.
    ///
    /// Adapters already holding a handle to the object keep it.
    pub fn destroy(&mut self, oid: Oid) -> Result<bool, MnemoError> {
        let existed = self.backend.store_mut().destroy_object(oid)?;
        if let Some(id) = self.loader.adapter_for(oid) {
            self.loader.unloaded(id)?;
        }
        debug!(%oid, existed, "destroyed object");
        Ok(existed)
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    /// Fully resolved adapter for `oid`.
    ///
    /// Fails with `UnknownIdentity` when there is no stored record; no
    /// adapter is created in that case.
    pub fn load(&mut self, oid: Oid) -> Result<AdapterId, MnemoError> {
        if let Some(id) = self.loader.adapter_for(oid) {
            self.resolve(id)?;
            return Ok(id);
        }

        let record = self
            .backend
            .store()
            .load_object(oid)?
            .ok_or(MnemoError::UnknownIdentity(oid))?;
        let id = self.loader.recreate_ghost(oid, &record.type_name)?;
        self.fill(id, ResolveState::Resolving, &record)?;
        Ok(id)
    }

    /// Load every field of a `GHOST` or `PART_RESOLVED` adapter.
    ///
    /// Adapters that are already fully readable are left untouched.
    pub fn resolve(&mut self, adapter: AdapterId) -> Result<(), MnemoError> {
        let state = self.loader.state(adapter)?;
        if state.is_resolved() && state != ResolveState::PartResolved {
            return Ok(());
        }
        let record = self.stored_record(adapter)?;
        self.fill(adapter, ResolveState::Resolving, &record)
    }

    /// Load only the scalar values of a `GHOST` (`-> PART_RESOLVED`).
    pub fn resolve_part(&mut self, adapter: AdapterId) -> Result<(), MnemoError> {
        if self.loader.state(adapter)?.is_resolved() {
            return Ok(());
        }
        let record = self.stored_record(adapter)?;
        self.fill(adapter, ResolveState::ResolvingPart, &record)
    }

    /// Reload a `RESOLVED` or `GHOST` adapter from the store (`UPDATING`).
    pub fn refresh(&mut self, adapter: AdapterId) -> Result<(), MnemoError> {
        let record = self.stored_record(adapter)?;
        self.fill(adapter, ResolveState::Updating, &record)
    }

    fn stored_record(&self, adapter: AdapterId) -> Result<ObjectRecord, MnemoError> {
        let a = self.loader.adapter(adapter)?;
        let Some(oid) = a.oid() else {
            return Err(MnemoError::NotResolved {
                adapter,
                state: a.state(),
            });
        };
        self.backend
            .store()
            .load_object(oid)?
            .ok_or(MnemoError::UnknownIdentity(oid))
    }

    /// Run one load phase, writing `record` into `adapter`.
    ///
    /// Association targets are materialized before the phase starts, so a
    /// failure leaves the adapter in its previous state.
    fn fill(&mut self, adapter: AdapterId, phase: ResolveState, record: &ObjectRecord) -> Result<(), MnemoError> {
        let full = phase != ResolveState::ResolvingPart;
        let mut references = Vec::new();
        let mut collections = Vec::new();
        if full {
            for (field, target) in &record.references {
                let target = match target {
                    Some(r) => Some(self.loader.recreate_ghost(r.oid, &r.type_name)?),
                    None => None,
                };
                references.push((field.clone(), target));
            }
            for (field, elements) in &record.collections {
                let mut ids = Vec::with_capacity(elements.len());
                for r in elements {
                    ids.push(self.loader.recreate_ghost(r.oid, &r.type_name)?);
                }
                collections.push((field.clone(), ids));
            }
        }

        self.loader.start_resolving(adapter, phase)?;
        let space = self.loader.space_mut();
        space.clear_fields(adapter)?;
        for (field, value) in &record.values {
            space.set_value(adapter, field.as_str(), value.clone())?;
        }
        for (field, target) in references {
            space.set_reference(adapter, field, target)?;
        }
        for (field, ids) in collections {
            space.set_collection(adapter, field, ids)?;
        }
        self.loader.end_resolving(adapter)?;

        debug!(%adapter, oid = %record.oid, phase = phase.code(), "loaded record");
        Ok(())
    }

    // =========================================================================
    // MEMENTOS
    // =========================================================================

    /// Snapshot a readable adapter.
    pub fn capture(&self, adapter: AdapterId) -> Result<Memento, MnemoError> {
        Memento::capture(&self.loader, &self.metamodel, adapter)
    }

    /// Rebuild a memento's graph in this session.
    pub fn recreate(&mut self, memento: &Memento, loaded: &mut LoadedObjects) -> Result<AdapterId, MnemoError> {
        memento.recreate_object(&mut self.loader, &self.metamodel, loaded)
    }

    // =========================================================================
    // ADMINISTRATION
    // =========================================================================

    /// Forget every in-memory adapter. Stored records are kept.
    pub fn reset(&mut self) {
        self.loader.reset();
    }

    /// Number of stored records.
    #[must_use]
    pub fn object_count(&self) -> usize {
        log_and_default(self.backend.store().object_count(), "object_count")
    }

    /// Stored Oids in ascending order.
    #[must_use]
    pub fn stored_oids(&self) -> Vec<Oid> {
        log_and_default(self.backend.store().oids(), "stored_oids")
    }

    /// Number of identities bound in this session.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.loader.identity_count()
    }
}

impl AdapterView for Session {
    fn adapter(&self, id: AdapterId) -> Result<&Adapter, MnemoError> {
        self.loader.adapter(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::TypeSpec;
    use tempfile::tempdir;

    fn metamodel() -> TypeRegistry {
        TypeRegistry::from_specs([
            TypeSpec::new("Person")
                .value("name")
                .one_to_one("team")
                .one_to_many("friends"),
            TypeSpec::new("Team").value("name").one_to_many("members"),
        ])
        .expect("metamodel")
    }

    fn team_with_fred(session: &mut Session) -> (AdapterId, AdapterId) {
        let team = session.create_transient("Team").expect("team");
        let fred = session.create_transient("Person").expect("fred");
        session.set_value(team, "name", "Red").expect("name");
        session.set_value(fred, "name", "Fred").expect("name");
        session.set_reference(fred, "team", Some(team)).expect("team");
        session.push_element(team, "members", fred).expect("member");
        (team, fred)
    }

    #[test]
    fn make_persistent_cascades_to_reachable_transients() {
        let mut session = Session::new(metamodel());
        let (team, fred) = team_with_fred(&mut session);

        let oid = session.make_persistent(team).expect("persist");

        assert_eq!(session.loader().oid(team).expect("oid"), Some(oid));
        assert!(session.loader().oid(fred).expect("oid").is_some());
        assert_eq!(session.state(fred).expect("state"), ResolveState::Resolved);
        assert_eq!(session.object_count(), 2);
        assert_eq!(session.identity_count(), 2);
    }

    /// Memory store whose saves start failing after `allowed` successes.
    #[derive(Debug)]
    struct FailingStore {
        inner: MemoryStore,
        allowed: usize,
    }

    impl ObjectStore for FailingStore {
        fn load_object(&self, oid: Oid) -> Result<Option<ObjectRecord>, MnemoError> {
            self.inner.load_object(oid)
        }

        fn next_assigned_oid(&mut self) -> Result<Oid, MnemoError> {
            self.inner.next_assigned_oid()
        }

        fn save_object(&mut self, record: &ObjectRecord) -> Result<(), MnemoError> {
            if self.allowed == 0 {
                return Err(MnemoError::IoError("disk full".to_string()));
            }
            self.allowed -= 1;
            self.inner.save_object(record)
        }

        fn destroy_object(&mut self, oid: Oid) -> Result<bool, MnemoError> {
            self.inner.destroy_object(oid)
        }

        fn object_count(&self) -> Result<usize, MnemoError> {
            self.inner.object_count()
        }

        fn oids(&self) -> Result<Vec<Oid>, MnemoError> {
            self.inner.oids()
        }
    }

    #[test]
    fn failed_save_promotes_nothing() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            allowed: 1,
        };
        let mut session =
            Session::with_backend(StorageBackend::Custom(Box::new(store)), metamodel());
        let (team, fred) = team_with_fred(&mut session);

        assert_eq!(
            session.make_persistent(team),
            Err(MnemoError::IoError("disk full".to_string()))
        );
        for id in [team, fred] {
            assert_eq!(session.state(id).expect("state"), ResolveState::Transient);
            assert_eq!(session.loader().oid(id).expect("oid"), None);
        }
        assert_eq!(session.identity_count(), 0);
    }

    #[test]
    fn edits_are_checked_against_metamodel() {
        let mut session = Session::new(metamodel());
        let fred = session.create_transient("Person").expect("fred");

        assert!(matches!(
            session.set_value(fred, "age", 3i64),
            Err(MnemoError::UnknownField { .. })
        ));
        assert!(matches!(
            session.set_value(fred, "team", "Red"),
            Err(MnemoError::FieldKindMismatch { .. })
        ));
        assert_eq!(
            session.create_transient("Ship"),
            Err(MnemoError::UnknownType("Ship".to_string()))
        );
    }

    #[test]
    fn load_brings_associations_back_as_ghosts() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        let team_oid = session.make_persistent(team).expect("persist");
        session.reset();

        let team = session.load(team_oid).expect("load");
        assert_eq!(session.state(team).expect("state"), ResolveState::Resolved);
        assert_eq!(session.value(team, "name").expect("name"), &Value::text("Red"));

        let members = session.collection(team, "members").expect("members").to_vec();
        assert_eq!(members.len(), 1);
        assert_eq!(session.state(members[0]).expect("state"), ResolveState::Ghost);

        session.resolve(members[0]).expect("resolve");
        assert_eq!(session.value(members[0], "name").expect("name"), &Value::text("Fred"));
        assert_eq!(session.reference(members[0], "team").expect("team"), Some(team));
    }

    #[test]
    fn loading_twice_yields_the_same_adapter() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        let oid = session.make_persistent(team).expect("persist");
        session.reset();

        let first = session.load(oid).expect("first");
        let second = session.load(oid).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn load_of_missing_record_creates_nothing() {
        let mut session = Session::new(metamodel());

        assert_eq!(session.load(Oid(42)), Err(MnemoError::UnknownIdentity(Oid(42))));
        assert_eq!(session.adapter_for(Oid(42)), None);
        assert!(session.loader().space().is_empty());
    }

    #[test]
    fn partial_then_full_resolution() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        let oid = session.make_persistent(team).expect("persist");
        session.reset();

        let ghost = session.loader.recreate_ghost(oid, "Team").expect("ghost");
        session.resolve_part(ghost).expect("part");
        assert_eq!(session.state(ghost).expect("state"), ResolveState::PartResolved);
        assert_eq!(session.value(ghost, "name").expect("name"), &Value::text("Red"));
        assert!(session.collection(ghost, "members").expect("members").is_empty());

        session.resolve(ghost).expect("full");
        assert_eq!(session.state(ghost).expect("state"), ResolveState::Resolved);
        assert_eq!(session.collection(ghost, "members").expect("members").len(), 1);
    }

    #[test]
    fn refresh_discards_unsaved_edits() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        session.make_persistent(team).expect("persist");

        session.set_value(team, "name", "Blue").expect("edit");
        session.refresh(team).expect("refresh");

        assert_eq!(session.value(team, "name").expect("name"), &Value::text("Red"));
        assert_eq!(session.state(team).expect("state"), ResolveState::Resolved);
    }

    #[test]
    fn save_writes_edits() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        let oid = session.make_persistent(team).expect("persist");

        session.set_value(team, "name", "Blue").expect("edit");
        session.save(team).expect("save");
        session.reset();

        let team = session.load(oid).expect("load");
        assert_eq!(session.value(team, "name").expect("name"), &Value::text("Blue"));
    }

    #[test]
    fn save_of_ghost_is_refused() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        let oid = session.make_persistent(team).expect("persist");
        session.reset();

        let ghost = session.loader.recreate_ghost(oid, "Team").expect("ghost");
        assert_eq!(
            session.save(ghost),
            Err(MnemoError::NotResolved {
                adapter: ghost,
                state: ResolveState::Ghost
            })
        );
    }

    #[test]
    fn hanging_reference_is_a_ghost_that_cannot_resolve() {
        let mut session = Session::new(metamodel());
        let (team, fred) = team_with_fred(&mut session);
        session.make_persistent(team).expect("persist");
        let fred_oid = session.loader().oid(fred).expect("oid").expect("persistent");
        let team_oid = session.loader().oid(team).expect("oid").expect("persistent");

        assert!(session.destroy(team_oid).expect("destroy"));
        session.reset();

        let fred = session.load(fred_oid).expect("load holder");
        let placeholder = session.reference(fred, "team").expect("field").expect("set");
        assert_eq!(session.loader().oid(placeholder).expect("oid"), Some(team_oid));
        assert_eq!(session.state(placeholder).expect("state"), ResolveState::Ghost);

        assert_eq!(
            session.resolve(placeholder),
            Err(MnemoError::UnknownIdentity(team_oid))
        );
        assert_eq!(session.state(placeholder).expect("state"), ResolveState::Ghost);
        assert_eq!(session.state(fred).expect("state"), ResolveState::Resolved);
    }

    #[test]
    fn destroy_unbinds_identity() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);
        let oid = session.make_persistent(team).expect("persist");

        assert!(session.destroy(oid).expect("destroy"));
        assert_eq!(session.adapter_for(oid), None);
        assert!(session.loader().space().contains(team));
        assert!(!session.destroy(oid).expect("destroy again"));
    }

    #[test]
    fn redb_session_survives_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("objects.redb");

        let oid = {
            let mut session = Session::with_redb(&db_path, metamodel()).expect("open");
            let (team, _) = team_with_fred(&mut session);
            session.make_persistent(team).expect("persist")
        };

        let mut session = Session::with_redb(&db_path, metamodel()).expect("reopen");
        assert!(session.is_persistent());
        assert_eq!(session.object_count(), 2);
        let team = session.load(oid).expect("load");
        assert_eq!(session.value(team, "name").expect("name"), &Value::text("Red"));
    }

    #[test]
    fn capture_and_recreate_through_session() {
        let mut session = Session::new(metamodel());
        let (team, _) = team_with_fred(&mut session);

        let memento = session.capture(team).expect("capture");
        let copy = session
            .recreate(&memento, &mut LoadedObjects::new())
            .expect("recreate");

        assert_ne!(copy, team);
        assert_eq!(session.value(copy, "name").expect("name"), &Value::text("Red"));
    }
}
