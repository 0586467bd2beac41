//! Graph reconstruction from a snapshot.

use super::{FieldData, Identity, LoadedObjects, ObjectData, Reference, TransientKey};
use crate::loader::ObjectLoader;
use crate::metamodel::Metamodel;
use crate::primitives::MAX_CAPTURE_DEPTH;
use crate::resolve::ResolveState;
use crate::space::AdapterView;
use crate::{AdapterId, FieldKind, MnemoError, Oid};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// State of one recreate call tree.
pub(super) struct Recreation<'a> {
    loader: &'a mut ObjectLoader,
    metamodel: &'a dyn Metamodel,
    loaded: &'a mut LoadedObjects,
    /// Transients rebuilt in this call, by capture-local key.
    transients: BTreeMap<TransientKey, AdapterId>,
    /// Adapters allocated by this call, for rollback.
    created: Vec<AdapterId>,
    /// `loaded` entries added by this call, for rollback.
    inserted: Vec<Oid>,
}

impl<'a> Recreation<'a> {
    pub(super) fn new(
        loader: &'a mut ObjectLoader,
        metamodel: &'a dyn Metamodel,
        loaded: &'a mut LoadedObjects,
    ) -> Self {
        Self {
            loader,
            metamodel,
            loaded,
            transients: BTreeMap::new(),
            created: Vec::new(),
            inserted: Vec::new(),
        }
    }

    /// Rebuild `root`; undo everything on failure.
    pub(super) fn run(mut self, root: &ObjectData) -> Result<AdapterId, MnemoError> {
        match self.object(root, 0) {
            Ok(id) => {
                debug!(
                    adapter = %id,
                    created = self.created.len(),
                    loaded = self.loaded.len(),
                    "recreated memento"
                );
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, created = self.created.len(), "recreate failed, rolling back");
                for oid in self.inserted.drain(..) {
                    self.loaded.forget(oid);
                }
                for id in self.created.drain(..) {
                    self.loader.discard(id);
                }
                Err(e)
            }
        }
    }

    fn object(&mut self, data: &ObjectData, depth: usize) -> Result<AdapterId, MnemoError> {
        if depth > MAX_CAPTURE_DEPTH {
            return Err(MnemoError::MalformedMemento(format!(
                "nesting deeper than {}",
                MAX_CAPTURE_DEPTH
            )));
        }

        match data.identity {
            Identity::Persistent(oid) => {
                if let Some(id) = self.loaded.get(oid) {
                    trace!(%oid, adapter = %id, "loaded objects hit");
                    self.check_type(id, &data.type_name)?;
                    return Ok(id);
                }
                if let Some(id) = self.loader.adapter_for(oid)
                    && self.loader.state(id)?.is_resolved()
                {
                    self.check_type(id, &data.type_name)?;
                    self.remember(oid, id)?;
                    trace!(%oid, adapter = %id, "adopted loaded adapter");
                    return Ok(id);
                }

                self.check_fields(data)?;
                let id = self.detached(oid, &data.type_name)?;
                self.loader.start_resolving(id, ResolveState::Resolving)?;
                self.populate(id, data, depth)?;
                self.loader.end_resolving(id)?;
                Ok(id)
            }
            Identity::Transient(key) => {
                if self.transients.contains_key(&key) {
                    return Err(MnemoError::MalformedMemento(format!(
                        "transient key {} captured twice",
                        key.0
                    )));
                }
                self.check_fields(data)?;
                let id = self.loader.create_transient(data.type_name.as_str())?;
                self.created.push(id);
                self.transients.insert(key, id);
                self.populate(id, data, depth)?;
                Ok(id)
            }
        }
    }

    fn populate(&mut self, id: AdapterId, data: &ObjectData, depth: usize) -> Result<(), MnemoError> {
        for (name, field) in &data.fields {
            match field {
                FieldData::Value(value) => {
                    self.loader
                        .space_mut()
                        .set_value(id, name.as_str(), value.clone())?;
                }
                FieldData::Reference(target) => {
                    let target = match target {
                        Some(r) => Some(self.reference(r, depth)?),
                        None => None,
                    };
                    self.loader
                        .space_mut()
                        .set_reference(id, name.as_str(), target)?;
                }
                FieldData::Collection(refs) => {
                    let mut elements = Vec::with_capacity(refs.len());
                    for r in refs {
                        elements.push(self.reference(r, depth)?);
                    }
                    self.loader
                        .space_mut()
                        .set_collection(id, name.as_str(), elements)?;
                }
            }
        }
        Ok(())
    }

    fn reference(&mut self, reference: &Reference, depth: usize) -> Result<AdapterId, MnemoError> {
        match reference {
            Reference::Persistent { oid, type_name } => {
                let oid = *oid;
                if let Some(id) = self.loaded.get(oid) {
                    self.check_type(id, type_name)?;
                    return Ok(id);
                }
                if let Some(id) = self.loader.adapter_for(oid) {
                    self.check_type(id, type_name)?;
                    self.remember(oid, id)?;
                    return Ok(id);
                }
                if !self.metamodel.contains_type(type_name) {
                    return Err(MnemoError::MalformedMemento(format!(
                        "unknown type {}",
                        type_name
                    )));
                }
                self.detached(oid, type_name)
            }
            Reference::Nested(data) => self.object(data, depth.saturating_add(1)),
            Reference::Seen(key) => self.transients.get(key).copied().ok_or_else(|| {
                MnemoError::MalformedMemento(format!("back-reference to unknown key {}", key.0))
            }),
        }
    }

    /// New `GHOST` carrying `oid`, registered in `loaded` but not in the
    /// loader's identity map.
    fn detached(&mut self, oid: Oid, type_name: &str) -> Result<AdapterId, MnemoError> {
        let id = self.loader.space_mut().create(type_name);
        self.created.push(id);
        self.loader.space_mut().set_oid(id, oid)?;
        self.loader.change_state(id, ResolveState::Ghost)?;
        self.remember(oid, id)?;
        Ok(id)
    }

    fn remember(&mut self, oid: Oid, id: AdapterId) -> Result<(), MnemoError> {
        if !self.loaded.contains(oid) {
            self.loaded.insert(oid, id)?;
            self.inserted.push(oid);
        }
        Ok(())
    }

    fn check_type(&self, id: AdapterId, expected: &str) -> Result<(), MnemoError> {
        let actual = self.loader.type_name(id)?;
        if actual != expected {
            return Err(MnemoError::MalformedMemento(format!(
                "object {} is a {}, memento says {}",
                id, actual, expected
            )));
        }
        Ok(())
    }

    /// Captured field set must equal the metamodel's, names and kinds.
    fn check_fields(&self, data: &ObjectData) -> Result<(), MnemoError> {
        let specs = self.metamodel.fields_of(&data.type_name).map_err(|_| {
            MnemoError::MalformedMemento(format!("unknown type {}", data.type_name))
        })?;

        let expected: BTreeMap<&str, FieldKind> =
            specs.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        let mut captured: BTreeMap<&str, FieldKind> = BTreeMap::new();
        for (name, field) in &data.fields {
            if captured.insert(name.as_str(), field.kind()).is_some() {
                return Err(MnemoError::MalformedMemento(format!(
                    "field {}.{} captured twice",
                    data.type_name, name
                )));
            }
        }

        if captured != expected {
            return Err(MnemoError::MalformedMemento(format!(
                "fields of {} do not match the metamodel",
                data.type_name
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::memento::{LoadedObjects, Memento};
    use crate::metamodel::{TypeRegistry, TypeSpec};
    use crate::space::AdapterView;
    use crate::{MnemoError, ObjectLoader, Oid, ResolveState, Value};

    fn metamodel() -> TypeRegistry {
        TypeRegistry::from_specs([
            TypeSpec::new("Person")
                .value("name")
                .one_to_one("partner")
                .one_to_many("friends"),
            TypeSpec::new("Team").value("name").one_to_many("members"),
        ])
        .expect("metamodel")
    }

    fn person(loader: &mut ObjectLoader, name: &str) -> crate::AdapterId {
        let p = loader.create_transient("Person").expect("person");
        loader
            .space_mut()
            .set_value(p, "name", Value::text(name))
            .expect("name");
        p
    }

    #[test]
    fn transient_round_trip_is_a_copy() {
        let mm = metamodel();
        let mut loader = ObjectLoader::new();
        let team = loader.create_transient("Team").expect("team");
        let fred = person(&mut loader, "Fred");
        let john = person(&mut loader, "John");
        let space = loader.space_mut();
        space.set_value(team, "name", Value::text("Red")).expect("name");
        space.push_element(team, "members", fred).expect("fred");
        space.push_element(team, "members", john).expect("john");

        let memento = Memento::capture(&loader, &mm, team).expect("capture");
        let copy = memento
            .recreate_object(&mut loader, &mm, &mut LoadedObjects::new())
            .expect("recreate");

        assert_ne!(copy, team);
        assert_eq!(loader.state(copy).expect("state"), ResolveState::Transient);
        assert_eq!(loader.value(copy, "name").expect("name"), &Value::text("Red"));
        let members = loader.collection(copy, "members").expect("members").to_vec();
        assert_eq!(members.len(), 2);
        assert!(!members.contains(&fred));
        assert_eq!(loader.value(members[0], "name").expect("name"), &Value::text("Fred"));
        assert_eq!(loader.value(members[1], "name").expect("name"), &Value::text("John"));
    }

    #[test]
    fn persistent_root_is_detached() {
        let mm = metamodel();
        let mut source = ObjectLoader::new();
        let fred = person(&mut source, "Fred");
        source.make_persistent(fred, Oid(9)).expect("persist");
        let memento = Memento::capture(&source, &mm, fred).expect("capture");

        let mut target = ObjectLoader::new();
        let mut loaded = LoadedObjects::new();
        let copy = memento
            .recreate_object(&mut target, &mm, &mut loaded)
            .expect("recreate");

        assert_eq!(target.oid(copy).expect("oid"), Some(Oid(9)));
        assert_eq!(target.state(copy).expect("state"), ResolveState::Resolved);
        assert_eq!(target.adapter_for(Oid(9)), None);
        assert_eq!(loaded.get(Oid(9)), Some(copy));
    }

    #[test]
    fn resolved_loader_adapter_is_adopted() {
        let mm = metamodel();
        let mut loader = ObjectLoader::new();
        let fred = person(&mut loader, "Fred");
        loader.make_persistent(fred, Oid(9)).expect("persist");
        let memento = Memento::capture(&loader, &mm, fred).expect("capture");

        let mut loaded = LoadedObjects::new();
        let adopted = memento
            .recreate_object(&mut loader, &mm, &mut loaded)
            .expect("recreate");

        assert_eq!(adopted, fred);
        assert_eq!(loaded.get(Oid(9)), Some(fred));
        assert_eq!(loader.space().len(), 1);
    }

    #[test]
    fn ghost_in_loader_is_not_adopted_as_root() {
        let mm = metamodel();
        let mut source = ObjectLoader::new();
        let fred = person(&mut source, "Fred");
        source.make_persistent(fred, Oid(9)).expect("persist");
        let memento = Memento::capture(&source, &mm, fred).expect("capture");

        let mut target = ObjectLoader::new();
        let ghost = target.recreate_ghost(Oid(9), "Person").expect("ghost");
        let copy = memento
            .recreate_object(&mut target, &mm, &mut LoadedObjects::new())
            .expect("recreate");

        assert_ne!(copy, ghost);
        assert_eq!(target.value(copy, "name").expect("name"), &Value::text("Fred"));
        assert_eq!(target.adapter_for(Oid(9)), Some(ghost));
    }

    #[test]
    fn transient_cycle_round_trips() {
        let mm = metamodel();
        let mut loader = ObjectLoader::new();
        let a = person(&mut loader, "A");
        let b = person(&mut loader, "B");
        let space = loader.space_mut();
        space.set_reference(a, "partner", Some(b)).expect("a->b");
        space.set_reference(b, "partner", Some(a)).expect("b->a");

        let memento = Memento::capture(&loader, &mm, a).expect("capture");
        let a2 = memento
            .recreate_object(&mut loader, &mm, &mut LoadedObjects::new())
            .expect("recreate");

        let b2 = loader.reference(a2, "partner").expect("ref").expect("partner");
        assert_eq!(loader.reference(b2, "partner").expect("ref"), Some(a2));
        assert_ne!(a2, a);
        assert_ne!(b2, b);
    }

    #[test]
    fn metamodel_drift_is_malformed_and_rolled_back() {
        let mm = metamodel();
        let mut loader = ObjectLoader::new();
        let team = loader.create_transient("Team").expect("team");
        let fred = person(&mut loader, "Fred");
        loader
            .space_mut()
            .push_element(team, "members", fred)
            .expect("push");
        let memento = Memento::capture(&loader, &mm, team).expect("capture");

        let drifted = TypeRegistry::from_specs([
            TypeSpec::new("Person").value("name").value("age"),
            TypeSpec::new("Team").value("name").one_to_many("members"),
        ])
        .expect("drifted");
        let before = loader.space().len();
        let mut loaded = LoadedObjects::new();

        let result = memento.recreate_object(&mut loader, &drifted, &mut loaded);

        assert!(matches!(result, Err(MnemoError::MalformedMemento(_))));
        assert_eq!(loader.space().len(), before);
        assert!(loaded.is_empty());
    }

    #[test]
    fn unknown_type_is_malformed() {
        let mm = metamodel();
        let mut loader = ObjectLoader::new();
        let team = loader.create_transient("Team").expect("team");
        let memento = Memento::capture(&loader, &mm, team).expect("capture");

        let other = TypeRegistry::from_specs([TypeSpec::new("Person")]).expect("other");
        assert!(matches!(
            memento.recreate_object(&mut loader, &other, &mut LoadedObjects::new()),
            Err(MnemoError::MalformedMemento(_))
        ));
    }

    #[test]
    fn rollback_keeps_prior_loaded_entries() {
        let mm = metamodel();
        let mut source = ObjectLoader::new();
        let team = source.create_transient("Team").expect("team");
        let fred = source.recreate_ghost(Oid(9), "Person").expect("fred");
        let stranger = source.create_transient("Ship").expect("ship");
        let space = source.space_mut();
        space.push_element(team, "members", fred).expect("fred");
        space.push_element(team, "members", stranger).expect("ship");
        let with_ship = TypeRegistry::from_specs([
            TypeSpec::new("Person")
                .value("name")
                .one_to_one("partner")
                .one_to_many("friends"),
            TypeSpec::new("Team").value("name").one_to_many("members"),
            TypeSpec::new("Ship"),
        ])
        .expect("with ship");
        let memento = Memento::capture(&source, &with_ship, team).expect("capture");

        let mut target = ObjectLoader::new();
        let mut loaded = LoadedObjects::new();
        let e = target.space_mut().create("Person");
        loaded.insert(Oid(17), e).expect("seed");

        let result = memento.recreate_object(&mut target, &mm, &mut loaded);

        assert!(matches!(result, Err(MnemoError::MalformedMemento(_))));
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(Oid(17)), Some(e));
        assert!(!loaded.contains(Oid(9)));
        assert_eq!(target.space().len(), 1);
    }
}
