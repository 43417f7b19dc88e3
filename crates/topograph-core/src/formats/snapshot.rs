//! # Snapshot Format
//!
//! Opaque, versioned blobs holding one [`Snapshot`].
//!
//! Format: standard base64 of Header (5 bytes) + postcard-serialized snapshot.
//! - 4 bytes: Magic ("TGSN")
//! - 1 byte: Version
//!
//! Encoding is deterministic: identical snapshots always produce identical
//! blobs, so a blob doubles as a version token for change detection.

use crate::ceph::{Snapshot, SnapshotKind};
use crate::primitives::{
    MAX_SNAPSHOT_BLOB_SIZE, SNAPSHOT_HEADER_LEN, SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
use crate::TopologyError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
        }
    }

    /// Validate magic bytes and version.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if &self.magic != SNAPSHOT_MAGIC {
            return Err(TopologyError::Decode("Invalid magic bytes".to_string()));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(TopologyError::Decode(format!(
                "Unsupported version: {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; SNAPSHOT_HEADER_LEN] {
        let mut bytes = [0u8; SNAPSHOT_HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TopologyError> {
        if bytes.len() < SNAPSHOT_HEADER_LEN {
            return Err(TopologyError::Decode("Header too short".to_string()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a snapshot into an opaque attribute value.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, TopologyError> {
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| TopologyError::Encode(e.to_string()))?;

    let mut bytes = Vec::with_capacity(SNAPSHOT_HEADER_LEN + payload.len());
    bytes.extend_from_slice(&SnapshotHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);

    Ok(STANDARD.encode(bytes))
}

/// Decode an attribute value produced by [`encode_snapshot`].
///
/// Size and header are validated before the payload is parsed.
pub fn decode_snapshot(blob: &str) -> Result<Snapshot, TopologyError> {
    if blob.len() > MAX_SNAPSHOT_BLOB_SIZE {
        return Err(TopologyError::Decode(format!(
            "Blob size {} bytes exceeds maximum allowed {} bytes",
            blob.len(),
            MAX_SNAPSHOT_BLOB_SIZE
        )));
    }

    let bytes = STANDARD
        .decode(blob)
        .map_err(|e| TopologyError::Decode(format!("failed base64 decode: {}", e)))?;

    let header = SnapshotHeader::from_bytes(&bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[SNAPSHOT_HEADER_LEN..])
        .map_err(|e| TopologyError::Decode(format!("Failed to decode snapshot: {}", e)))
}

/// Decode a blob and check that it holds the expected kind.
pub fn decode_snapshot_kind(blob: &str, kind: SnapshotKind) -> Result<Snapshot, TopologyError> {
    let snapshot = decode_snapshot(blob)?;
    if snapshot.kind() != kind {
        return Err(TopologyError::Decode(format!(
            "expected {} snapshot, found {}",
            kind,
            snapshot.kind()
        )));
    }
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================
