//! # Verification State Machine
//!
//! Moderation transitions for nodes and edges.
//!
//! - `pending -> {verified, rejected, inferred}`; verified/rejected are
//!   terminal; inferred may still be approved or rejected
//! - Any action on a terminal item is an idempotent no-op success
//! - The review queue orders pending nodes by recency and pending edges
//!   by computed confidence

use crate::confidence::{self, EdgeConfidence};
use crate::graph::UniverseGraph;
use crate::types::{
    Edge, EdgeId, EntityKind, ModerationAction, Node, NodeId, OrreryError, VerificationStatus,
};
use serde::{Deserialize, Serialize};

/// Result of applying one moderation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// Which table was targeted.
    pub entity_kind: EntityKind,
    /// Which row was targeted.
    pub entity_id: String,
    /// Status before the action.
    pub previous: VerificationStatus,
    /// Status after the action.
    pub current: VerificationStatus,
    /// Whether anything actually transitioned. No-ops report success
    /// with `changed = false` and leave no audit trace.
    pub changed: bool,
}

/// One item of a batch moderation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub entity_kind: EntityKind,
    pub entity_id: String,
}

/// Aggregate result of a batch moderation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Items that transitioned.
    pub updated: usize,
    /// Items that were missing, terminal, or deferred.
    pub skipped: usize,
}

/// A queued edge with its derived confidence.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEdgeEntry {
    pub edge: Edge,
    pub confidence: EdgeConfidence,
}

/// Counts over the current queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Nodes awaiting review.
    pub pending_nodes: usize,
    /// Edges awaiting review (pending or inferred).
    pub pending_edges: usize,
    /// Queued edges with confidence >= 70.
    pub high_confidence: usize,
    /// Queued edges with confidence < 50.
    pub low_confidence: usize,
}

/// The full review queue.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationQueue {
    /// Pending nodes, newest first.
    pub pending_nodes: Vec<Node>,
    /// Pending and inferred edges, most confident first.
    pub pending_edges: Vec<PendingEdgeEntry>,
    pub stats: QueueStats,
}

/// The transition table.
///
/// Returns the new status, or `None` when the action does not move the
/// item: defers never move, terminal states never move. Nothing in the
/// current table is an error; `InvalidTransition` stays reserved for
/// future entries.
#[must_use]
pub const fn next_status(
    current: VerificationStatus,
    action: ModerationAction,
) -> Option<VerificationStatus> {
    if current.is_terminal() {
        return None;
    }
    match action {
        ModerationAction::Approve => Some(VerificationStatus::Verified),
        ModerationAction::Reject => Some(VerificationStatus::Rejected),
        ModerationAction::Defer => None,
    }
}

/// Apply one moderation action to a node or edge.
///
/// Missing ids report `NotFound` and leave state unchanged. The caller
/// owns auditing; this function only performs the transition.
pub fn apply_action(
    graph: &mut UniverseGraph,
    entity_kind: EntityKind,
    entity_id: &str,
    action: ModerationAction,
) -> Result<TransitionOutcome, OrreryError> {
    let previous = match entity_kind {
        EntityKind::Node => graph
            .node(&NodeId::new(entity_id))
            .map(|n| n.verification_status),
        EntityKind::Edge => graph
            .edge(&EdgeId::new(entity_id))
            .map(|e| e.verification_status),
    }
    .ok_or_else(|| {
        OrreryError::NotFound(format!("{} {entity_id:?}", entity_kind.as_str()))
    })?;

    let Some(next) = next_status(previous, action) else {
        return Ok(TransitionOutcome {
            entity_kind,
            entity_id: entity_id.to_string(),
            previous,
            current: previous,
            changed: false,
        });
    };

    match entity_kind {
        EntityKind::Node => {
            if let Some(node) = graph.node_mut(&NodeId::new(entity_id)) {
                node.verification_status = next;
            }
        }
        EntityKind::Edge => {
            if let Some(edge) = graph.edge_mut(&EdgeId::new(entity_id)) {
                edge.verification_status = next;
            }
        }
    }

    Ok(TransitionOutcome {
        entity_kind,
        entity_id: entity_id.to_string(),
        previous,
        current: next,
        changed: true,
    })
}

/// Build the review queue from current graph state.
///
/// Ordering is deterministic: nodes by `created_at` descending then id;
/// edges by computed confidence descending then id.
#[must_use]
pub fn build_queue(graph: &UniverseGraph) -> VerificationQueue {
    let mut pending_nodes: Vec<Node> = graph
        .nodes()
        .filter(|n| n.verification_status == VerificationStatus::Pending)
        .cloned()
        .collect();
    pending_nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut pending_edges: Vec<PendingEdgeEntry> = graph
        .edges()
        .filter(|e| {
            matches!(
                e.verification_status,
                VerificationStatus::Pending | VerificationStatus::Inferred
            )
        })
        .map(|e| PendingEdgeEntry {
            confidence: confidence::score_edge(e, graph),
            edge: e.clone(),
        })
        .collect();
    pending_edges.sort_by(|a, b| {
        b.confidence
            .score
            .cmp(&a.confidence.score)
            .then_with(|| a.edge.id.cmp(&b.edge.id))
    });

    let high_confidence = pending_edges
        .iter()
        .filter(|entry| entry.confidence.is_high())
        .count();
    let low_confidence = pending_edges
        .iter()
        .filter(|entry| entry.confidence.is_low())
        .count();

    let stats = QueueStats {
        pending_nodes: pending_nodes.len(),
        pending_edges: pending_edges.len(),
        high_confidence,
        low_confidence,
    };

    VerificationQueue {
        pending_nodes,
        pending_edges,
        stats,
    }
}

// =============================================================================
// TESTS
// =============================================================================
