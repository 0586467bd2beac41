//! Flat serialized form of a [`Memento`].
//!
//! Every object with full data is stored once in a list, root first, and
//! nested references point into that list by index. Decoding never recurses
//! on input nesting; the tree is rebuilt afterwards with the same depth bound
//! capture uses, and every list entry must be used exactly once.

use super::{FieldData, Identity, Memento, ObjectData, Reference, TransientKey};
use crate::primitives::MAX_CAPTURE_DEPTH;
use crate::{Oid, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Serialize, Deserialize)]
struct WireMemento {
    objects: Vec<WireObject>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireObject {
    identity: Identity,
    type_name: String,
    fields: Vec<(String, WireField)>,
}

#[derive(Debug, Serialize, Deserialize)]
enum WireField {
    Value(Value),
    Reference(Option<WireRef>),
    Collection(Vec<WireRef>),
}

#[derive(Debug, Serialize, Deserialize)]
enum WireRef {
    Persistent { oid: Oid, type_name: String },
    Nested(usize),
    Seen(TransientKey),
}

// =============================================================================
// FLATTEN
// =============================================================================

#[derive(Default)]
struct Flattener {
    objects: Vec<WireObject>,
}

impl Flattener {
    fn object(&mut self, data: &ObjectData) -> usize {
        let index = self.objects.len();
        self.objects.push(WireObject {
            identity: data.identity,
            type_name: data.type_name.clone(),
            fields: Vec::new(),
        });
        let fields = data
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), self.field(field)))
            .collect();
        if let Some(slot) = self.objects.get_mut(index) {
            slot.fields = fields;
        }
        index
    }

    fn field(&mut self, field: &FieldData) -> WireField {
        match field {
            FieldData::Value(v) => WireField::Value(v.clone()),
            FieldData::Reference(r) => WireField::Reference(r.as_ref().map(|r| self.reference(r))),
            FieldData::Collection(refs) => {
                WireField::Collection(refs.iter().map(|r| self.reference(r)).collect())
            }
        }
    }

    fn reference(&mut self, reference: &Reference) -> WireRef {
        match reference {
            Reference::Persistent { oid, type_name } => WireRef::Persistent {
                oid: *oid,
                type_name: type_name.clone(),
            },
            Reference::Nested(data) => WireRef::Nested(self.object(data)),
            Reference::Seen(key) => WireRef::Seen(*key),
        }
    }
}

// =============================================================================
// REBUILD
// =============================================================================

struct Rebuilder {
    slots: Vec<Option<WireObject>>,
}

impl Rebuilder {
    fn object(&mut self, index: usize, depth: usize) -> Result<ObjectData, String> {
        if depth > MAX_CAPTURE_DEPTH {
            return Err(format!("nesting exceeds depth {}", MAX_CAPTURE_DEPTH));
        }
        let Some(wire) = self.slots.get_mut(index).and_then(Option::take) else {
            return Err(format!("object {} is missing or referenced twice", index));
        };

        let mut fields = Vec::with_capacity(wire.fields.len());
        for (name, field) in wire.fields {
            fields.push((name, self.field(field, depth)?));
        }
        Ok(ObjectData {
            identity: wire.identity,
            type_name: wire.type_name,
            fields,
        })
    }

    fn field(&mut self, field: WireField, depth: usize) -> Result<FieldData, String> {
        Ok(match field {
            WireField::Value(v) => FieldData::Value(v),
            WireField::Reference(r) => {
                FieldData::Reference(r.map(|r| self.reference(r, depth)).transpose()?)
            }
            WireField::Collection(refs) => FieldData::Collection(
                refs.into_iter()
                    .map(|r| self.reference(r, depth))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn reference(&mut self, reference: WireRef, depth: usize) -> Result<Reference, String> {
        Ok(match reference {
            WireRef::Persistent { oid, type_name } => Reference::Persistent { oid, type_name },
            WireRef::Nested(index) => {
                Reference::Nested(Box::new(self.object(index, depth.saturating_add(1))?))
            }
            WireRef::Seen(key) => Reference::Seen(key),
        })
    }
}

impl WireMemento {
    fn from_memento(memento: &Memento) -> Self {
        let mut flattener = Flattener::default();
        flattener.object(&memento.root);
        Self {
            objects: flattener.objects,
        }
    }

    fn into_memento(self) -> Result<Memento, String> {
        if self.objects.is_empty() {
            return Err("memento has no root object".to_string());
        }
        let mut rebuilder = Rebuilder {
            slots: self.objects.into_iter().map(Some).collect(),
        };
        let root = rebuilder.object(0, 0)?;
        let unused = rebuilder.slots.iter().filter(|s| s.is_some()).count();
        if unused > 0 {
            return Err(format!("{} objects are not reachable from the root", unused));
        }
        Ok(Memento { root })
    }
}

impl Serialize for Memento {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireMemento::from_memento(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Memento {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireMemento::deserialize(deserializer)?
            .into_memento()
            .map_err(serde::de::Error::custom)
    }
}
