//! # Metamodel
//!
//! The narrow view of the reflection layer the engine consumes: for a type
//! name, the ordered list of `(field name, field kind)` pairs. Capture and
//! recreate both iterate fields through this interface, so they never know
//! anything about concrete domain types.

use crate::primitives::{MAX_FIELD_NAME_LENGTH, MAX_TYPE_NAME_LENGTH};
use crate::{FieldKind, MnemoError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One field of a domain type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A domain type: its name and fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl TypeSpec {
    /// Start a type definition with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a scalar value field.
    #[must_use]
    pub fn value(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Value)
    }

    /// Append a to-one association.
    #[must_use]
    pub fn one_to_one(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::OneToOne)
    }

    /// Append a to-many association.
    #[must_use]
    pub fn one_to_many(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::OneToMany)
    }

    fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec::new(name, kind));
        self
    }
}

// =============================================================================
// METAMODEL TRAIT
// =============================================================================

/// Reflection over domain types.
pub trait Metamodel {
    /// Ordered fields of a type.
    fn fields_of(&self, type_name: &str) -> Result<&[FieldSpec], MnemoError>;

    /// A single field of a type, checked for existence.
    fn field(&self, type_name: &str, field: &str) -> Result<&FieldSpec, MnemoError> {
        self.fields_of(type_name)?
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| MnemoError::UnknownField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// A field of a type, checked for existence and kind.
    fn field_of_kind(
        &self,
        type_name: &str,
        field: &str,
        kind: FieldKind,
    ) -> Result<&FieldSpec, MnemoError> {
        let spec = self.field(type_name, field)?;
        if spec.kind != kind {
            return Err(MnemoError::FieldKindMismatch {
                field: format!("{}.{}", type_name, field),
                expected: kind,
                found: spec.kind,
            });
        }
        Ok(spec)
    }

    /// Whether the type is known.
    fn contains_type(&self, type_name: &str) -> bool {
        self.fields_of(type_name).is_ok()
    }
}

// =============================================================================
// TYPE REGISTRY
// =============================================================================

/// In-memory metamodel built from explicit type definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeSpec>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of type definitions.
    pub fn from_specs(specs: impl IntoIterator<Item = TypeSpec>) -> Result<Self, MnemoError> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Add a type definition.
    ///
    /// Rejects empty or over-long names, duplicate field names, and
    /// redefinition of an already registered type.
    pub fn register(&mut self, spec: TypeSpec) -> Result<(), MnemoError> {
        validate_name(&spec.name, MAX_TYPE_NAME_LENGTH, "type")?;
        if self.types.contains_key(&spec.name) {
            return Err(MnemoError::InvalidTypeSpec(format!(
                "type {} defined twice",
                spec.name
            )));
        }

        let mut seen = BTreeSet::new();
        for field in &spec.fields {
            validate_name(&field.name, MAX_FIELD_NAME_LENGTH, "field")?;
            if !seen.insert(field.name.as_str()) {
                return Err(MnemoError::InvalidTypeSpec(format!(
                    "field {}.{} defined twice",
                    spec.name, field.name
                )));
            }
        }

        self.types.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_type(mut self, spec: TypeSpec) -> Result<Self, MnemoError> {
        self.register(spec)?;
        Ok(self)
    }

    /// All registered types in name order.
    pub fn types(&self) -> impl Iterator<Item = &TypeSpec> {
        self.types.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Metamodel for TypeRegistry {
    fn fields_of(&self, type_name: &str) -> Result<&[FieldSpec], MnemoError> {
        self.types
            .get(type_name)
            .map(|t| t.fields.as_slice())
            .ok_or_else(|| MnemoError::UnknownType(type_name.to_string()))
    }
}

fn validate_name(name: &str, max: usize, what: &str) -> Result<(), MnemoError> {
    if name.is_empty() {
        return Err(MnemoError::InvalidTypeSpec(format!("empty {} name", what)));
    }
    if name.len() > max {
        return Err(MnemoError::InvalidTypeSpec(format!(
            "{} name longer than {} bytes",
            what, max
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
