//! # mnemo-core
//!
//! Object identity, lazy resolution and identity-preserving snapshots for a
//! business-object layer.
//!
//! Three pieces make up the engine:
//! - the resolve-state machine (`resolve`), which says what "loaded" means
//!   for an object and which lifecycle transitions are legal;
//! - the identity map (`loader`), which keeps at most one adapter per Oid
//!   and is the only place lifecycle changes happen;
//! - mementos (`memento`), detached snapshots that rebuild a graph with
//!   shared and cyclic references intact.
//!
//! `Session` ties them to an object store and a metamodel.
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no async, no network, no global state
//! - Deterministic: `BTreeMap`/`BTreeSet` only, integer arithmetic only
//! - No panics in library code; every failure is a `MnemoError`

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod loader;
pub mod memento;
pub mod metamodel;
pub mod primitives;
pub mod resolve;
pub mod session;
pub mod space;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use resolve::{ResolveState, is_valid_to_change_to};
pub use types::{AdapterId, FieldKind, MnemoError, Oid, Value};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use loader::ObjectLoader;
pub use memento::{FieldData, Identity, LoadedObjects, Memento, ObjectData, Reference, TransientKey};
pub use metamodel::{FieldSpec, Metamodel, TypeRegistry, TypeSpec};
pub use session::{Session, StorageBackend};
pub use space::{Adapter, AdapterView, ObjectSpace};
pub use storage::{MemoryStore, ObjectRecord, ObjectStore, RecordRef, RedbStore};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{MementoHeader, memento_from_bytes, memento_to_bytes};

#[cfg(feature = "crypto-hash")]
pub use formats::memento_digest;
