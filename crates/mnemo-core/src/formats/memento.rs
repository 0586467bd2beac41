//! # Memento Binary Format
//!
//! Format: Header (5 bytes) + postcard-serialized [`Memento`].
//! - 4 bytes: Magic ("MNEM")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded, so corrupted
//! or oversized input fails without large allocations. The payload lists
//! nested objects flat, so decoding depth does not follow input nesting.

use crate::memento::Memento;
use crate::primitives::{FORMAT_VERSION, HEADER_LENGTH, MAGIC_BYTES, MAX_MEMENTO_PAYLOAD_SIZE};
use crate::MnemoError;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every encoded memento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MementoHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl MementoHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), MnemoError> {
        if &self.magic != MAGIC_BYTES {
            return Err(MnemoError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(MnemoError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut bytes = [0u8; HEADER_LENGTH];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MnemoError> {
        let Some(header) = bytes.get(..HEADER_LENGTH) else {
            return Err(MnemoError::SerializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for MementoHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a memento (header + payload).
pub fn memento_to_bytes(memento: &Memento) -> Result<Vec<u8>, MnemoError> {
    let payload = postcard::to_stdvec(memento)
        .map_err(|e| MnemoError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LENGTH + payload.len());
    result.extend_from_slice(&MementoHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a memento.
///
/// Rejects input shorter than the header, larger than
/// [`MAX_MEMENTO_PAYLOAD_SIZE`], with a foreign magic or version, or with
/// trailing bytes after the payload.
pub fn memento_from_bytes(bytes: &[u8]) -> Result<Memento, MnemoError> {
    if bytes.len() > MAX_MEMENTO_PAYLOAD_SIZE {
        return Err(MnemoError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_MEMENTO_PAYLOAD_SIZE
        )));
    }

    let header = MementoHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[HEADER_LENGTH..];
    let (memento, rest) = postcard::take_from_bytes::<Memento>(payload).map_err(|e| {
        MnemoError::SerializationError(format!("Failed to decode memento: {}", e))
    })?;
    if !rest.is_empty() {
        return Err(MnemoError::SerializationError(format!(
            "{} trailing bytes after memento",
            rest.len()
        )));
    }
    Ok(memento)
}

/// BLAKE3 hex digest of the encoded memento.
///
/// Equal mementos have equal digests.
#[cfg(feature = "crypto-hash")]
pub fn memento_digest(memento: &Memento) -> Result<String, MnemoError> {
    let bytes = memento_to_bytes(memento)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{TypeRegistry, TypeSpec};
    use crate::{ObjectLoader, Oid, Value};

    fn sample() -> Memento {
        let mm = TypeRegistry::from_specs([
            TypeSpec::new("Person").value("name").one_to_one("team"),
            TypeSpec::new("Team").value("name").one_to_many("members"),
        ])
        .expect("metamodel");
        let mut loader = ObjectLoader::new();
        let team = loader.create_transient("Team").expect("team");
        let fred = loader.recreate_ghost(Oid(9), "Person").expect("fred");
        let john = loader.create_transient("Person").expect("john");
        let space = loader.space_mut();
        space.set_value(team, "name", Value::text("Red")).expect("name");
        space.set_value(john, "name", Value::text("John")).expect("name");
        space.set_reference(john, "team", Some(team)).expect("team");
        space.push_element(team, "members", fred).expect("fred");
        space.push_element(team, "members", john).expect("john");
        Memento::capture(&loader, &mm, team).expect("capture")
    }

    #[test]
    fn header_roundtrip() {
        let bytes = MementoHeader::new().to_bytes();
        let restored = MementoHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored, MementoHeader::new());
        restored.validate().expect("valid");
    }

    #[test]
    fn encoding_is_stable() {
        let memento = sample();
        let first = memento_to_bytes(&memento).expect("encode");
        let decoded = memento_from_bytes(&first).expect("decode");
        let second = memento_to_bytes(&decoded).expect("re-encode");

        assert_eq!(decoded, memento);
        assert_eq!(first, second);
        assert_eq!(&first[..4], MAGIC_BYTES);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = memento_to_bytes(&sample()).expect("encode");
        bytes[0..4].copy_from_slice(b"KREM");
        assert!(matches!(
            memento_from_bytes(&bytes),
            Err(MnemoError::SerializationError(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = memento_to_bytes(&sample()).expect("encode");
        bytes[4] = FORMAT_VERSION.wrapping_add(1);
        assert!(memento_from_bytes(&bytes).is_err());
    }

    #[test]
    fn short_and_truncated_input_rejected() {
        assert!(memento_from_bytes(b"MNE").is_err());

        let bytes = memento_to_bytes(&sample()).expect("encode");
        let truncated = &bytes[..bytes.len() - 1];
        assert!(memento_from_bytes(truncated).is_err());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = memento_to_bytes(&sample()).expect("encode");
        bytes.push(0);
        assert!(memento_from_bytes(&bytes).is_err());
    }

    #[test]
    fn oversized_input_rejected_before_decoding() {
        let mut bytes = vec![0u8; MAX_MEMENTO_PAYLOAD_SIZE + 1];
        bytes[..HEADER_LENGTH].copy_from_slice(&MementoHeader::new().to_bytes());
        let err = memento_from_bytes(&bytes).expect_err("too large");
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn deeply_nested_payload_fails_cleanly() {
        let mut bytes = MementoHeader::new().to_bytes().to_vec();
        for _ in 0..20_000 {
            bytes.extend_from_slice(&[0x01, 0x00, 0x01, b'P', 0x01, 0x01, b'f', 0x01, 0x01, 0x01]);
        }
        assert!(bytes.len() < MAX_MEMENTO_PAYLOAD_SIZE);
        assert!(matches!(
            memento_from_bytes(&bytes),
            Err(MnemoError::SerializationError(_))
        ));
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn digest_tracks_content() {
        let memento = sample();
        let a = memento_digest(&memento).expect("digest");
        let b = memento_digest(&memento.clone()).expect("digest");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
