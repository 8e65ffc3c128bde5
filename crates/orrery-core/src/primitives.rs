//! # Engine Primitives
//!
//! Hardcoded runtime constants for the orrery CORE.
//!
//! The engine starts with zero data but fixed rules. These constants are
//! compiled into the binary and immutable at runtime; every derived score
//! is a function of the graph, a clock value, and nothing else.

/// Magic bytes for the orrery persistence file header.
///
/// - File Header = Magic Bytes ("ORRY") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"ORRY";

/// Current persistence format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum hop count for opportunity path discovery.
///
/// Paths longer than this carry too little signal to act on and blow up
/// the DFS combinatorially, so discovery stops here.
pub const MAX_PATH_HOPS: usize = 3;

/// Maximum depth when walking dependency chains for the depth component.
///
/// All scoring walks must be computationally bounded; chains deeper than
/// this already saturate the component.
pub const MAX_CHAIN_DEPTH: usize = 100;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for entity ids and labels.
///
/// Longer ids/labels are rejected at the insert boundary.
/// This prevents memory exhaustion from malicious or malformed input.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Maximum length for free-text fields (descriptions, drafts, reasons).
///
/// Texts longer than this (64KB) are rejected at the insert boundary.
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Maximum number of evidence items attached to a single node or edge.
pub const MAX_EVIDENCE_ITEMS: usize = 100;

/// Maximum number of items in a single verify-batch call.
///
/// Larger batches are rejected to keep one request's work bounded.
pub const MAX_BATCH_ITEMS: usize = 500;

// =============================================================================
// IMPORT LIMITS
// =============================================================================

/// Maximum node count accepted from a canonical import.
pub const MAX_IMPORT_NODE_COUNT: usize = 1_000_000;

/// Maximum edge count accepted from a canonical import.
pub const MAX_IMPORT_EDGE_COUNT: usize = 10_000_000;

/// Maximum persistence payload size in bytes (500MB).
///
/// Snapshots larger than this are rejected before deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"ORRY");
    }

    #[test]
    fn batch_cap_is_positive() {
        assert!(MAX_BATCH_ITEMS > 0);
    }
}
