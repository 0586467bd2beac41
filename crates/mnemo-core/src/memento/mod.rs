//! # Memento
//!
//! Detached, serializable snapshots of an adapter and the transient objects
//! reachable from it, and the reconstruction of a live graph from them.
//!
//! ## Capture policy
//!
//! The root is captured with every field the metamodel reports. For each
//! associated object:
//! - persistent (has an Oid): only `{oid, type}` is recorded;
//! - transient: a full nested [`ObjectData`] is recorded, because there is no
//!   identity to fall back on later;
//! - transient and already captured in this memento: a back-reference
//!   ([`Reference::Seen`]) to its capture-local [`TransientKey`].
//!
//! Persistent references are shallow by construction, so snapshot size is
//! bounded by the transient sub-graph alone.
//!
//! ## Recreate
//!
//! See [`Memento::recreate_object`]. Identity is preserved through a
//! [`LoadedObjects`] registry supplied by the caller.

mod capture;
mod loaded;
mod recreate;
mod wire;

pub use loaded::LoadedObjects;

use crate::loader::ObjectLoader;
use crate::metamodel::Metamodel;
use crate::space::AdapterView;
use crate::{AdapterId, FieldKind, MnemoError, Oid, Value};
use serde::{Deserialize, Serialize};

// =============================================================================
// DATA MODEL
// =============================================================================

/// Capture-local name of a transient object inside one memento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransientKey(pub u32);

/// Identity of a captured object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    Persistent(Oid),
    Transient(TransientKey),
}

/// A reference from one captured object to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Reference-only placeholder for a persistent object.
    Persistent { oid: Oid, type_name: String },
    /// Full snapshot of a transient object.
    Nested(Box<ObjectData>),
    /// A transient object captured earlier in the same memento.
    Seen(TransientKey),
}

/// Captured contents of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldData {
    Value(Value),
    Reference(Option<Reference>),
    Collection(Vec<Reference>),
}

impl FieldData {
    /// The field kind this data was captured from.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Value(_) => FieldKind::Value,
            Self::Reference(_) => FieldKind::OneToOne,
            Self::Collection(_) => FieldKind::OneToMany,
        }
    }
}

/// Snapshot of one object: identity, type and fields in metamodel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    identity: Identity,
    type_name: String,
    fields: Vec<(String, FieldData)>,
}

impl ObjectData {
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Captured fields in metamodel order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldData)> {
        self.fields.iter().map(|(name, data)| (name.as_str(), data))
    }

    /// Captured data of one field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldData> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data)
    }

    /// Number of objects with full data in this snapshot, including itself.
    #[must_use]
    pub fn object_count(&self) -> usize {
        let nested: usize = self
            .fields
            .iter()
            .map(|(_, data)| match data {
                FieldData::Value(_) | FieldData::Reference(None) => 0,
                FieldData::Reference(Some(r)) => r.object_count(),
                FieldData::Collection(refs) => refs.iter().map(Reference::object_count).sum(),
            })
            .sum();
        nested.saturating_add(1)
    }
}

impl Reference {
    fn object_count(&self) -> usize {
        match self {
            Self::Nested(data) => data.object_count(),
            Self::Persistent { .. } | Self::Seen(_) => 0,
        }
    }
}

// =============================================================================
// MEMENTO
// =============================================================================

/// Immutable, detached snapshot of an adapter.
///
/// There are no mutators; a memento is produced by [`Memento::capture`] or
/// decoded from bytes, and consumed by [`Memento::recreate_object`].
///
/// Serialized flat: nested objects are listed once and referenced by index,
/// and decoding rejects nesting deeper than
/// [`MAX_CAPTURE_DEPTH`](crate::primitives::MAX_CAPTURE_DEPTH).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memento {
    root: ObjectData,
}

impl Memento {
    /// Snapshot `adapter` as seen through `view`.
    ///
    /// The root must be readable (see [`ResolveState::is_resolved`](crate::ResolveState::is_resolved)).
    pub fn capture<V>(view: &V, metamodel: &dyn Metamodel, adapter: AdapterId) -> Result<Self, MnemoError>
    where
        V: AdapterView + ?Sized,
    {
        let root = capture::Capture::new(view, metamodel).object(adapter, 0)?;
        Ok(Self { root })
    }

    /// Rebuild a live graph from this snapshot inside `loader`.
    ///
    /// 1. A persistent identity already in `loaded` is returned as is.
    /// 2. A persistent identity the loader holds in a readable state is adopted.
    /// 3. Otherwise a new detached adapter is built, registered in `loaded`
    ///    before its fields are visited, and populated.
    ///
    /// Within one `loaded` registry every Oid maps to one adapter, so shared
    /// and cyclic references come back reference-identical. Recreated
    /// persistent adapters are not added to the loader's identity map.
    ///
    /// On error, every adapter created by this call is discarded and every
    /// entry it added to `loaded` is withdrawn.
    pub fn recreate_object(
        &self,
        loader: &mut ObjectLoader,
        metamodel: &dyn Metamodel,
        loaded: &mut LoadedObjects,
    ) -> Result<AdapterId, MnemoError> {
        recreate::Recreation::new(loader, metamodel, loaded).run(&self.root)
    }

    /// The root object snapshot.
    #[must_use]
    pub fn root(&self) -> &ObjectData {
        &self.root
    }

    /// Oid of the root, if it was persistent.
    #[must_use]
    pub fn oid(&self) -> Option<Oid> {
        match self.root.identity {
            Identity::Persistent(oid) => Some(oid),
            Identity::Transient(_) => None,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.oid().is_none()
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.root.type_name
    }

    /// Number of objects captured with full data.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.root.object_count()
    }
}
