//! # Snapshot Format
//!
//! Binary serialization for the `file` storage backend.
//!
//! Format: Header (5 bytes) + postcard-serialized store data.
//! - 4 bytes: Magic ("AGRA")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded, so a
//! corrupted or oversized file never reaches the deserializer.

use crate::store::{MemoryStore, SerializableStore};
use crate::{AgoraError, primitives};

/// Maximum accepted snapshot size (256 MB).
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Reject foreign files and unsupported versions.
    pub fn validate(&self) -> Result<(), AgoraError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(AgoraError::SerializationError(
                "Not an Agora snapshot (bad magic bytes)".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(AgoraError::SerializationError(format!(
                "Unsupported snapshot version {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AgoraError> {
        if bytes.len() < HEADER_LEN {
            return Err(AgoraError::SerializationError(
                "Snapshot header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a store to snapshot bytes (header + payload).
pub fn store_to_bytes(store: &MemoryStore) -> Result<Vec<u8>, AgoraError> {
    let payload =
        postcard::to_stdvec(&SerializableStore::from(store)).map_err(AgoraError::codec)?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a store from snapshot bytes, rebuilding its indexes.
pub fn store_from_bytes(bytes: &[u8]) -> Result<MemoryStore, AgoraError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(AgoraError::SerializationError(format!(
            "Snapshot of {} bytes exceeds the {} byte limit",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let snapshot: SerializableStore =
        postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
            AgoraError::SerializationError(format!("Failed to decode snapshot: {}", e))
        })?;
    Ok(MemoryStore::from(snapshot))
}

// =============================================================================
// TESTS
// =============================================================================
