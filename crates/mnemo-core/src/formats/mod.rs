//! # Formats
//!
//! Byte-level encodings. Pure transformations; file I/O lives in the app.

pub mod memento;

pub use memento::{MementoHeader, memento_from_bytes, memento_to_bytes};

#[cfg(feature = "crypto-hash")]
pub use memento::memento_digest;
