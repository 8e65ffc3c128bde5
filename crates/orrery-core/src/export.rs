//! # Canonical Export Module
//!
//! Deterministic byte snapshots for backup, transfer, and content
//! hashing. The redb files the store writes are not guaranteed
//! bit-identical across runs; the canonical export is. Two graphs with
//! equal contents always produce equal bytes, so exports can be
//! compared, checksummed, and diffed out of band.
//!
//! Layout:
//! ```text
//! [header_len: u32 LE] [CanonicalHeader (postcard)] [body (postcard)]
//! ```
//!
//! The body is the graph's serializable form with every entity vector in
//! id order. Import validates magic, version, entity-count caps, and the
//! body checksum before deserializing the body.

use crate::graph::{SerializableUniverse, UniverseGraph};
use crate::primitives::{MAX_IMPORT_EDGE_COUNT, MAX_IMPORT_NODE_COUNT};
use crate::types::OrreryError;
use serde::{Deserialize, Serialize};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes identifying a canonical export.
pub const CANONICAL_MAGIC: [u8; 4] = *b"ORRX";

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Header prepended to every canonical export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalHeader {
    /// Magic bytes identifying the format.
    pub magic: [u8; 4],
    /// Format version.
    pub version: u8,
    /// Number of nodes in the body.
    pub node_count: u64,
    /// Number of edges in the body.
    pub edge_count: u64,
    /// FNV-1a checksum of the body bytes.
    pub checksum: u64,
}

impl CanonicalHeader {
    /// Create a header for the given counts and body checksum.
    #[must_use]
    pub fn new(node_count: u64, edge_count: u64, checksum: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            node_count,
            edge_count,
            checksum,
        }
    }

    /// Validate magic and version. Messages stay generic; they can end
    /// up in responses to untrusted callers.
    pub fn validate(&self) -> Result<(), OrreryError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(OrreryError::DeserializationError(
                "unrecognized export format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(OrreryError::DeserializationError(
                "unsupported export version".to_string(),
            ));
        }
        Ok(())
    }
}

/// FNV-1a over a byte slice.
///
/// Not a cryptographic hash: it detects corruption and makes cheap
/// equality checks, nothing more. Integer-only and position-sensitive.
#[must_use]
pub fn body_checksum(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export a graph to canonical bytes.
pub fn export_canonical(graph: &UniverseGraph) -> Result<Vec<u8>, OrreryError> {
    let body = postcard::to_allocvec(&SerializableUniverse::from(graph))
        .map_err(|e| OrreryError::SerializationError(format!("body: {e}")))?;

    let header = CanonicalHeader::new(
        graph.node_count() as u64,
        graph.edge_count() as u64,
        body_checksum(&body),
    );
    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| OrreryError::SerializationError(format!("header: {e}")))?;

    let mut out = Vec::with_capacity(4 + header_bytes.len() + body.len());
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Import a graph from canonical bytes.
///
/// The header is fully validated (magic, version, count caps, body
/// checksum) before any entity is deserialized, so oversized or
/// corrupted inputs fail without the body ever being decoded.
pub fn import_canonical(data: &[u8]) -> Result<UniverseGraph, OrreryError> {
    let too_short = || OrreryError::DeserializationError("export data too short".to_string());

    let prefix: [u8; 4] = data.get(..4).and_then(|s| s.try_into().ok()).ok_or_else(too_short)?;
    let header_len = u32::from_le_bytes(prefix) as usize;
    let header_end = 4usize.saturating_add(header_len);
    let header_bytes = data.get(4..header_end).ok_or_else(too_short)?;
    let body = data.get(header_end..).ok_or_else(too_short)?;

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| OrreryError::DeserializationError(format!("header: {e}")))?;
    header.validate()?;

    if header.node_count > MAX_IMPORT_NODE_COUNT as u64 {
        return Err(OrreryError::DeserializationError(format!(
            "node count {} exceeds the import cap {MAX_IMPORT_NODE_COUNT}",
            header.node_count
        )));
    }
    if header.edge_count > MAX_IMPORT_EDGE_COUNT as u64 {
        return Err(OrreryError::DeserializationError(format!(
            "edge count {} exceeds the import cap {MAX_IMPORT_EDGE_COUNT}",
            header.edge_count
        )));
    }

    let computed = body_checksum(body);
    if computed != header.checksum {
        return Err(OrreryError::DeserializationError(format!(
            "checksum mismatch: header {}, body {computed}",
            header.checksum
        )));
    }

    let snapshot: SerializableUniverse = postcard::from_bytes(body)
        .map_err(|e| OrreryError::DeserializationError(format!("body: {e}")))?;

    if snapshot.nodes.len() as u64 != header.node_count {
        return Err(OrreryError::DeserializationError(
            "node count mismatch".to_string(),
        ));
    }
    if snapshot.edges.len() as u64 != header.edge_count {
        return Err(OrreryError::DeserializationError(
            "edge count mismatch".to_string(),
        ));
    }

    Ok(UniverseGraph::from(snapshot))
}

/// Whether `canonical_data` is a valid export matching `graph` exactly.
pub fn verify_canonical(graph: &UniverseGraph, canonical_data: &[u8]) -> Result<bool, OrreryError> {
    // Validates the input fully before comparing.
    import_canonical(canonical_data)?;
    Ok(export_canonical(graph)? == canonical_data)
}

/// Canonical checksum of a graph's current contents.
pub fn canonical_checksum(graph: &UniverseGraph) -> Result<u64, OrreryError> {
    let body = postcard::to_allocvec(&SerializableUniverse::from(graph))
        .map_err(|e| OrreryError::SerializationError(format!("body: {e}")))?;
    Ok(body_checksum(&body))
}

// =============================================================================
// CRYPTOGRAPHIC HASH (feature = "crypto-hash")
// =============================================================================

/// BLAKE3 hash of the canonical export, as a 64-character hex string.
///
/// The FNV checksum detects corruption; this detects tampering.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(graph: &UniverseGraph) -> Result<String, OrreryError> {
    let data = export_canonical(graph)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

/// Whether the graph's canonical export matches a BLAKE3 hex digest.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn verify_crypto_hash(graph: &UniverseGraph, expected_hash: &str) -> bool {
    canonical_crypto_hash(graph).map_or(false, |actual| actual == expected_hash)
}

// =============================================================================
// TESTS
// =============================================================================
