//! # Core Type Definitions
//!
//! This module contains the core types shared by every part of the engine:
//! - Identifiers (`Oid`, `AdapterId`)
//! - Field payloads (`Value`, `FieldKind`)
//! - Error types (`MnemoError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use crate::resolve::ResolveState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Persistent identity of a domain object.
///
/// Assigned once by the object store when the object is first persisted and
/// never changed afterwards. Two adapters denote the same object iff their
/// Oids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid(pub u64);

impl Oid {
    /// Get the raw identifier.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of an adapter inside an [`ObjectSpace`](crate::space::ObjectSpace).
///
/// Handle equality is reference identity: two handles are equal iff they
/// address the same in-memory adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdapterId(pub u64);

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

// =============================================================================
// FIELDS
// =============================================================================

/// Scalar payload of a value field.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// No value set.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Get the value as a string slice, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check whether the value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// The shape of a field as reported by the metamodel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A scalar value copied by value.
    Value,
    /// A single associated object.
    OneToOne,
    /// An ordered collection of associated objects.
    OneToMany,
}

impl FieldKind {
    /// Human-readable name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the mnemo engine.
///
/// - No silent failures
/// - Use `Result<T, MnemoError>` for fallible operations
/// - None of these are retried internally
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MnemoError {
    /// A lifecycle transition outside the resolve-state table was attempted.
    #[error("Invalid resolve-state transition: {from} -> {to}")]
    InvalidTransition { from: ResolveState, to: ResolveState },

    /// The Oid is already bound to a different adapter.
    #[error("Duplicate identity: {oid} is already bound to another adapter")]
    DuplicateIdentity { oid: Oid },

    /// Nothing can resolve the Oid (hanging reference or never persisted).
    #[error("Unknown identity: {0}")]
    UnknownIdentity(Oid),

    /// The memento does not match the metamodel or is internally inconsistent.
    #[error("Malformed memento: {0}")]
    MalformedMemento(String),

    /// An adapter already carries a different Oid.
    #[error("Oid already assigned: adapter has {existing}, refused {requested}")]
    OidAlreadyAssigned { existing: Oid, requested: Oid },

    /// The adapter handle does not address a live adapter.
    #[error("Unknown adapter: {0}")]
    UnknownAdapter(AdapterId),

    /// The metamodel does not know the type.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// A type definition handed to the registry is invalid.
    #[error("Invalid type spec: {0}")]
    InvalidTypeSpec(String),

    /// The type has no field of that name.
    #[error("Unknown field: {type_name}.{field}")]
    UnknownField { type_name: String, field: String },

    /// The field exists but has a different kind.
    #[error("Field {field} is {found}, expected {expected}")]
    FieldKindMismatch {
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },

    /// The adapter's fields are not readable in its current state.
    #[error("Adapter {adapter} is not resolved (state {state})")]
    NotResolved {
        adapter: AdapterId,
        state: ResolveState,
    },

    /// Transient nesting exceeded the capture bound.
    #[error("Capture exceeded maximum depth {0}")]
    CaptureTooDeep(usize),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred in the object store.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
