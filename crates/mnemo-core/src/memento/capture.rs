//! Snapshot construction.

use super::{FieldData, Identity, ObjectData, Reference, TransientKey};
use crate::metamodel::Metamodel;
use crate::primitives::MAX_CAPTURE_DEPTH;
use crate::space::AdapterView;
use crate::{AdapterId, FieldKind, MnemoError};
use std::collections::BTreeMap;
use tracing::trace;

/// State of one capture walk.
pub(super) struct Capture<'a, V: AdapterView + ?Sized> {
    view: &'a V,
    metamodel: &'a dyn Metamodel,
    /// Transient adapters already assigned a key in this memento.
    transients: BTreeMap<AdapterId, TransientKey>,
    next_key: u32,
}

impl<'a, V: AdapterView + ?Sized> Capture<'a, V> {
    pub(super) fn new(view: &'a V, metamodel: &'a dyn Metamodel) -> Self {
        Self {
            view,
            metamodel,
            transients: BTreeMap::new(),
            next_key: 0,
        }
    }

    /// Full snapshot of one adapter.
    pub(super) fn object(&mut self, id: AdapterId, depth: usize) -> Result<ObjectData, MnemoError> {
        if depth > MAX_CAPTURE_DEPTH {
            return Err(MnemoError::CaptureTooDeep(MAX_CAPTURE_DEPTH));
        }

        let view = self.view;
        let metamodel = self.metamodel;
        let adapter = view.adapter(id)?;
        if !adapter.state().is_resolved() {
            return Err(MnemoError::NotResolved {
                adapter: id,
                state: adapter.state(),
            });
        }

        // Key the transient before visiting fields so cycles end in `Seen`.
        let identity = match adapter.oid() {
            Some(oid) => Identity::Persistent(oid),
            None => {
                let key = TransientKey(self.next_key);
                self.next_key = self.next_key.saturating_add(1);
                self.transients.insert(id, key);
                Identity::Transient(key)
            }
        };
        trace!(adapter = %id, type_name = adapter.type_name(), depth, "capturing");

        let specs = metamodel.fields_of(adapter.type_name())?;
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let data = match spec.kind {
                FieldKind::Value => FieldData::Value(adapter.value(&spec.name).clone()),
                FieldKind::OneToOne => {
                    let target = adapter.reference(&spec.name);
                    FieldData::Reference(
                        target.map(|t| self.reference(t, depth)).transpose()?,
                    )
                }
                FieldKind::OneToMany => {
                    let elements = adapter.collection(&spec.name);
                    let mut refs = Vec::with_capacity(elements.len());
                    for element in elements {
                        refs.push(self.reference(*element, depth)?);
                    }
                    FieldData::Collection(refs)
                }
            };
            fields.push((spec.name.clone(), data));
        }

        Ok(ObjectData {
            identity,
            type_name: adapter.type_name().to_string(),
            fields,
        })
    }

    fn reference(&mut self, target: AdapterId, depth: usize) -> Result<Reference, MnemoError> {
        let view = self.view;
        let adapter = view.adapter(target)?;
        if let Some(oid) = adapter.oid() {
            return Ok(Reference::Persistent {
                oid,
                type_name: adapter.type_name().to_string(),
            });
        }
        if let Some(key) = self.transients.get(&target) {
            return Ok(Reference::Seen(*key));
        }
        let nested = self.object(target, depth.saturating_add(1))?;
        Ok(Reference::Nested(Box::new(nested)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
