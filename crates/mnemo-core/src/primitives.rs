//! # Engine Primitives
//!
//! Hardcoded constants for the mnemo engine.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Magic bytes for the binary memento format header.
///
/// - Header = Magic Bytes ("MNEM") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MNEM";

/// Current memento serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Length of the memento header in bytes.
pub const HEADER_LENGTH: usize = 5;

/// Maximum nesting depth of transient objects inside one memento.
///
/// Persistent references are captured by Oid only, so only chains of
/// never-persisted objects nest. Deeper chains are rejected rather than
/// risking unbounded recursion.
pub const MAX_CAPTURE_DEPTH: usize = 64;

/// Maximum length of a type name in the metamodel.
pub const MAX_TYPE_NAME_LENGTH: usize = 128;

/// Maximum length of a field name in the metamodel.
pub const MAX_FIELD_NAME_LENGTH: usize = 128;

/// Maximum size of an encoded memento (16 MB).
///
/// Validated before any payload decoding.
pub const MAX_MEMENTO_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// First Oid handed out by a fresh object store.
pub const FIRST_OID: u64 = 1;
