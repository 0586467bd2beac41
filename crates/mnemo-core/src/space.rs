//! # Object Space
//!
//! The arena holding every live adapter of a session.
//!
//! Adapters never own each other. Associations are stored as [`AdapterId`]
//! handles into this arena, so cyclic object graphs need no reference
//! counting and no interior mutability. Reference identity is handle
//! equality.
//!
//! Field setters are public; lifecycle fields (state, Oid) are only changed
//! through the [`ObjectLoader`](crate::loader::ObjectLoader).

use crate::resolve::ResolveState;
use crate::{AdapterId, MnemoError, Oid, Value};
use std::collections::BTreeMap;

// =============================================================================
// ADAPTER
// =============================================================================

/// In-memory wrapper around one domain object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    id: AdapterId,
    type_name: String,
    oid: Option<Oid>,
    state: ResolveState,
    values: BTreeMap<String, Value>,
    references: BTreeMap<String, Option<AdapterId>>,
    collections: BTreeMap<String, Vec<AdapterId>>,
}

impl Adapter {
    fn new(id: AdapterId, type_name: String) -> Self {
        Self {
            id,
            type_name,
            oid: None,
            state: ResolveState::New,
            values: BTreeMap::new(),
            references: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> AdapterId {
        self.id
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn oid(&self) -> Option<Oid> {
        self.oid
    }

    #[must_use]
    pub fn state(&self) -> ResolveState {
        self.state
    }

    /// Whether the adapter has a persistent identity.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.oid.is_some()
    }

    /// Scalar field value; unset fields read as `Null`.
    #[must_use]
    pub fn value(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(field).unwrap_or(&NULL)
    }

    /// To-one association target.
    #[must_use]
    pub fn reference(&self, field: &str) -> Option<AdapterId> {
        self.references.get(field).copied().flatten()
    }

    /// To-many association elements in order; unset fields read as empty.
    #[must_use]
    pub fn collection(&self, field: &str) -> &[AdapterId] {
        self.collections.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All set scalar values in field-name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// =============================================================================
// ADAPTER VIEW
// =============================================================================

/// Read capability over adapters, as consumed by memento capture.
pub trait AdapterView {
    /// Look up an adapter by handle.
    fn adapter(&self, id: AdapterId) -> Result<&Adapter, MnemoError>;

    fn oid(&self, id: AdapterId) -> Result<Option<Oid>, MnemoError> {
        Ok(self.adapter(id)?.oid())
    }

    fn state(&self, id: AdapterId) -> Result<ResolveState, MnemoError> {
        Ok(self.adapter(id)?.state())
    }

    fn type_name(&self, id: AdapterId) -> Result<&str, MnemoError> {
        Ok(self.adapter(id)?.type_name())
    }

    fn value(&self, id: AdapterId, field: &str) -> Result<&Value, MnemoError> {
        Ok(self.adapter(id)?.value(field))
    }

    fn reference(&self, id: AdapterId, field: &str) -> Result<Option<AdapterId>, MnemoError> {
        Ok(self.adapter(id)?.reference(field))
    }

    fn collection(&self, id: AdapterId, field: &str) -> Result<&[AdapterId], MnemoError> {
        Ok(self.adapter(id)?.collection(field))
    }
}

// =============================================================================
// OBJECT SPACE
// =============================================================================

/// Arena of adapters addressed by [`AdapterId`].
#[derive(Debug, Clone, Default)]
pub struct ObjectSpace {
    adapters: BTreeMap<AdapterId, Adapter>,
    next_adapter_id: u64,
}

impl ObjectSpace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new adapter in state `NEW`, with no Oid and no fields.
    pub fn create(&mut self, type_name: impl Into<String>) -> AdapterId {
        let id = AdapterId(self.next_adapter_id);
        self.next_adapter_id = self.next_adapter_id.saturating_add(1);
        self.adapters.insert(id, Adapter::new(id, type_name.into()));
        id
    }

    /// Handle the next [`create`](Self::create) will return.
    pub(crate) fn next_id(&self) -> AdapterId {
        AdapterId(self.next_adapter_id)
    }

    #[must_use]
    pub fn get(&self, id: AdapterId) -> Option<&Adapter> {
        self.adapters.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: AdapterId) -> bool {
        self.adapters.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// All adapters in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Adapter> {
        self.adapters.values()
    }

    /// Set a scalar field.
    pub fn set_value(
        &mut self,
        id: AdapterId,
        field: impl Into<String>,
        value: Value,
    ) -> Result<(), MnemoError> {
        self.adapter_mut(id)?.values.insert(field.into(), value);
        Ok(())
    }

    /// Set or clear a to-one association.
    pub fn set_reference(
        &mut self,
        id: AdapterId,
        field: impl Into<String>,
        target: Option<AdapterId>,
    ) -> Result<(), MnemoError> {
        if let Some(target) = target {
            self.require(target)?;
        }
        self.adapter_mut(id)?
            .references
            .insert(field.into(), target);
        Ok(())
    }

    /// Replace a to-many association.
    pub fn set_collection(
        &mut self,
        id: AdapterId,
        field: impl Into<String>,
        elements: Vec<AdapterId>,
    ) -> Result<(), MnemoError> {
        for element in &elements {
            self.require(*element)?;
        }
        self.adapter_mut(id)?
            .collections
            .insert(field.into(), elements);
        Ok(())
    }

    /// Append one element to a to-many association.
    pub fn push_element(
        &mut self,
        id: AdapterId,
        field: impl Into<String>,
        element: AdapterId,
    ) -> Result<(), MnemoError> {
        self.require(element)?;
        self.adapter_mut(id)?
            .collections
            .entry(field.into())
            .or_default()
            .push(element);
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE (crate-internal, driven by the loader)
    // =========================================================================

    pub(crate) fn set_state(&mut self, id: AdapterId, state: ResolveState) -> Result<(), MnemoError> {
        self.adapter_mut(id)?.state = state;
        Ok(())
    }

    pub(crate) fn set_oid(&mut self, id: AdapterId, oid: Oid) -> Result<(), MnemoError> {
        let adapter = self.adapter_mut(id)?;
        match adapter.oid {
            Some(existing) if existing != oid => Err(MnemoError::OidAlreadyAssigned {
                existing,
                requested: oid,
            }),
            _ => {
                adapter.oid = Some(oid);
                Ok(())
            }
        }
    }

    /// Drop all field contents, keeping identity and state.
    pub(crate) fn clear_fields(&mut self, id: AdapterId) -> Result<(), MnemoError> {
        let adapter = self.adapter_mut(id)?;
        adapter.values.clear();
        adapter.references.clear();
        adapter.collections.clear();
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: AdapterId) -> Option<Adapter> {
        self.adapters.remove(&id)
    }

    pub(crate) fn clear(&mut self) {
        self.adapters.clear();
    }

    fn require(&self, id: AdapterId) -> Result<(), MnemoError> {
        if self.adapters.contains_key(&id) {
            Ok(())
        } else {
            Err(MnemoError::UnknownAdapter(id))
        }
    }

    fn adapter_mut(&mut self, id: AdapterId) -> Result<&mut Adapter, MnemoError> {
        self.adapters
            .get_mut(&id)
            .ok_or(MnemoError::UnknownAdapter(id))
    }
}

impl AdapterView for ObjectSpace {
    fn adapter(&self, id: AdapterId) -> Result<&Adapter, MnemoError> {
        self.adapters.get(&id).ok_or(MnemoError::UnknownAdapter(id))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_allocates_distinct_handles() {
        let mut space = ObjectSpace::new();
        let a = space.create("Person");
        let b = space.create("Person");

        assert_ne!(a, b);
        assert_eq!(space.len(), 2);
        assert_eq!(space.state(a).expect("state"), ResolveState::New);
        assert_eq!(space.oid(a).expect("oid"), None);
    }

    #[test]
    fn unset_fields_read_as_defaults() {
        let mut space = ObjectSpace::new();
        let a = space.create("Person");

        assert_eq!(space.value(a, "name").expect("value"), &Value::Null);
        assert_eq!(space.reference(a, "team").expect("ref"), None);
        assert!(space.collection(a, "friends").expect("coll").is_empty());
    }

    #[test]
    fn fields_round_trip() {
        let mut space = ObjectSpace::new();
        let team = space.create("Team");
        let fred = space.create("Person");
        let john = space.create("Person");

        space
            .set_value(fred, "name", Value::text("Fred"))
            .expect("set");
        space.set_reference(fred, "team", Some(team)).expect("set");
        space.push_element(team, "members", fred).expect("push");
        space.push_element(team, "members", john).expect("push");

        assert_eq!(space.value(fred, "name").expect("value"), &Value::text("Fred"));
        assert_eq!(space.reference(fred, "team").expect("ref"), Some(team));
        assert_eq!(space.collection(team, "members").expect("coll"), &[fred, john]);
    }

    #[test]
    fn dangling_targets_rejected() {
        let mut space = ObjectSpace::new();
        let a = space.create("Person");
        let missing = AdapterId(99);

        assert_eq!(
            space.set_reference(a, "team", Some(missing)),
            Err(MnemoError::UnknownAdapter(missing))
        );
        assert_eq!(
            space.push_element(a, "friends", missing),
            Err(MnemoError::UnknownAdapter(missing))
        );
        assert!(space.collection(a, "friends").expect("coll").is_empty());
    }

    #[test]
    fn oid_assigned_once() {
        let mut space = ObjectSpace::new();
        let a = space.create("Person");

        space.set_oid(a, Oid(9)).expect("assign");
        space.set_oid(a, Oid(9)).expect("same oid is a no-op");
        assert_eq!(
            space.set_oid(a, Oid(17)),
            Err(MnemoError::OidAlreadyAssigned {
                existing: Oid(9),
                requested: Oid(17)
            })
        );
    }

    #[test]
    fn cyclic_references_need_no_ownership() {
        let mut space = ObjectSpace::new();
        let a = space.create("Person");
        let b = space.create("Person");

        space.set_reference(a, "friend", Some(b)).expect("set");
        space.set_reference(b, "friend", Some(a)).expect("set");

        assert_eq!(space.reference(a, "friend").expect("ref"), Some(b));
        assert_eq!(space.reference(b, "friend").expect("ref"), Some(a));
    }
}
