//! # orrery-core
//!
//! The deterministic knowledge-graph engine for orrery - THE LOGIC.
//!
//! This crate implements the scoring and verification substrate: a typed
//! graph of builds, skills, and people, with every derived number (cluster
//! levels, edge confidence, completeness, gaps, opportunities) recomputed
//! from graph state plus a clock value.
//!
//! ## Architectural Constraints
//!
//! - Deterministic: same graph + same clock value = same output, always
//! - Integer-only scoring: no floating point anywhere in the engine
//! - `BTreeMap`/`BTreeSet` storage for deterministic iteration order
//! - No async, no network dependencies (pure Rust); the HTTP surface and
//!   the external text generator live in sibling crates
//! - The engine never panics; all errors are recoverable `OrreryError`s

// =============================================================================
// MODULES
// =============================================================================

pub mod confidence;
pub mod export;
pub mod formats;
pub mod gaps;
pub mod graph;
pub mod opportunity;
pub mod primitives;
pub mod scoring;
pub mod storage;
pub mod types;
pub mod universe;
pub mod verification;
pub mod view;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AccessMode, AuditAction, AuditRecord, Cluster, ClusterId, Edge, EdgeId, EdgeType, EffortLevel,
    EntityKind, EvidenceItem, GapId, GapKind, GapStatus, LearningGap, ModerationAction, MonthStamp,
    Node, NodeId, NodeStatus, NodeType, NodeWorld, Opportunity, OpportunityId, OpportunityKind,
    OpportunitySource, OpportunityStatus, OrreryError, VerificationStatus,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use confidence::{ConfidenceBreakdown, EdgeConfidence};
pub use export::{
    CanonicalHeader, canonical_checksum, export_canonical, import_canonical, verify_canonical,
};
pub use gaps::{GapConfig, GapRefreshOutcome};
pub use graph::{SerializableUniverse, UniverseGraph};
pub use opportunity::{OpportunityMergeOutcome, OutreachMessage, parse_outreach};
pub use scoring::{ClusterMetrics, Completeness, ScoreComponents};
pub use storage::RedbStore;
pub use universe::{ImportOutcome, Universe};
pub use verification::{
    BatchItem, BatchOutcome, PendingEdgeEntry, QueueStats, TransitionOutcome, VerificationQueue,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, graph_from_bytes, graph_to_bytes};

// =============================================================================
// RE-EXPORTS: Views (from view module)
// =============================================================================

pub use view::{
    ClusterView, EdgeView, GapView, NodeDetail, NodeRef, NodeView, PartnerContext, UniverseStats,
};
