//! # Persistence Format
//!
//! Binary serialization for universe graphs.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("ORRY")
//! - 1 byte: Version
//!
//! ## Security
//!
//! Pre-deserialization validation keeps hostile payloads cheap to
//! reject:
//! - Maximum payload size limit (`primitives::MAX_PERSISTENCE_PAYLOAD_SIZE`)
//! - Header validation before payload parsing

use crate::graph::{SerializableUniverse, UniverseGraph};
use crate::primitives;
use crate::types::OrreryError;

/// Minimum valid payload size (header only).
const MIN_PAYLOAD_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all graph data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), OrreryError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(OrreryError::DeserializationError(
                "invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(OrreryError::DeserializationError(format!(
                "unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OrreryError> {
        let magic: [u8; 4] = bytes
            .get(0..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| OrreryError::DeserializationError("header too short".to_string()))?;
        let version = *bytes
            .get(4)
            .ok_or_else(|| OrreryError::DeserializationError("header too short".to_string()))?;
        Ok(Self { magic, version })
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

/// Serialize a graph to bytes (header + payload). No file I/O.
pub fn graph_to_bytes(graph: &UniverseGraph) -> Result<Vec<u8>, OrreryError> {
    let header = PersistenceHeader::new();
    let serializable = SerializableUniverse::from(graph);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| OrreryError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(5 + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a graph from bytes. No file I/O.
///
/// Size bounds and the header are checked before the payload is
/// touched, so corrupted or oversized data never reaches postcard.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<UniverseGraph, OrreryError> {
    if bytes.len() < MIN_PAYLOAD_SIZE {
        return Err(OrreryError::DeserializationError(
            "data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > primitives::MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(OrreryError::DeserializationError(format!(
            "data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(5..).unwrap_or_default();
    let serializable: SerializableUniverse = postcard::from_bytes(payload).map_err(|e| {
        OrreryError::DeserializationError(format!("failed to deserialize graph data: {e}"))
    })?;

    Ok(UniverseGraph::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, EdgeType, MonthStamp, Node, NodeType};
    use chrono::DateTime;

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let bytes = header.to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let stamp = MonthStamp::parse("2025-03").expect("stamp");
        let mut graph = UniverseGraph::new();
        graph.insert_node(Node::new(
            "me",
            "Me",
            NodeType::Person,
            stamp,
            DateTime::UNIX_EPOCH,
        ));
        graph.insert_node(Node::new(
            "proj",
            "Project",
            NodeType::Project,
            stamp,
            DateTime::UNIX_EPOCH,
        ));
        assert!(graph.insert_edge(Edge::new(
            "e1",
            "me",
            "proj",
            EdgeType::BuiltWith,
            DateTime::UNIX_EPOCH,
        )));

        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");

        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");

        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = graph_to_bytes(&UniverseGraph::new()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;

        let error = graph_from_bytes(&bytes).expect_err("must reject");
        assert!(error.to_string().contains("unsupported version"));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(graph_from_bytes(&[]).is_err());
        assert!(graph_from_bytes(b"ORRY").is_err());
    }
}
