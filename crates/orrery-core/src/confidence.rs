//! # Confidence Module
//!
//! Derived confidence scoring for edges.
//!
//! - Confidence is recomputed from current graph state on every read,
//!   never stored on the edge
//! - Four additive factors: endpoint reliability, relation kind base,
//!   evidence boost, co-occurrence boost
//! - Thresholds split scores into high / medium / low bands

use crate::graph::UniverseGraph;
use crate::types::{Edge, EdgeType, VerificationStatus};
use serde::{Deserialize, Serialize};

/// Scores at or above this are "high" confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: u8 = 70;

/// Scores below this are "low" confidence.
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 50;

/// The scoring formula, verbatim, for display next to breakdowns.
pub const CONFIDENCE_FORMULA: &str =
    "min(100, source_reliability + edge_type_base + evidence_boost + co_occurrence_boost)";

/// Per-factor contributions to an edge confidence score.
///
/// Factor maxima: reliability 50, type base 30, evidence 20,
/// co-occurrence 20. The pre-clamp sum can reach 120; the final score
/// clamps to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    /// Average verification reliability of the two endpoints, 0-50.
    pub source_reliability: u8,
    /// Base contribution of the relation kind, 10-30.
    pub edge_type_base: u8,
    /// 5 per evidence item, capped at 20.
    pub evidence_boost: u8,
    /// 5 per independent two-hop path between the endpoints, capped at 20.
    pub co_occurrence_boost: u8,
    /// Sum of the four components before the 100 clamp, at most 120.
    pub pre_clamp_total: u16,
}

/// A computed edge confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfidence {
    /// Clamped total, 0-100.
    pub score: u8,
    /// Where the total came from.
    pub breakdown: ConfidenceBreakdown,
}

impl EdgeConfidence {
    /// Score is in the high band.
    #[must_use]
    pub fn is_high(&self) -> bool {
        self.score >= HIGH_CONFIDENCE_THRESHOLD
    }

    /// Score is in the low band.
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.score < LOW_CONFIDENCE_THRESHOLD
    }

    /// Band name, total over all scores.
    #[must_use]
    pub fn band(&self) -> &'static str {
        if self.is_high() {
            "high"
        } else if self.is_low() {
            "low"
        } else {
            "medium"
        }
    }
}

/// Reliability contribution of one endpoint's verification status.
///
/// Verified endpoints anchor an edge; rejected endpoints contribute
/// nothing even though the edge itself may still be pending.
#[must_use]
pub const fn node_reliability(status: VerificationStatus) -> u8 {
    match status {
        VerificationStatus::Verified => 50,
        VerificationStatus::Inferred => 30,
        VerificationStatus::Pending => 15,
        VerificationStatus::Rejected => 0,
    }
}

/// Base confidence of a relation kind, total over all variants.
///
/// Relations checkable against an artifact (a build, a talk, a win)
/// score high; speculative relations score low.
#[must_use]
pub const fn edge_type_base(edge_type: EdgeType) -> u8 {
    match edge_type {
        EdgeType::BuiltWith => 30,
        EdgeType::WonAt | EdgeType::PresentedAt => 28,
        EdgeType::EndorsedBy | EdgeType::Uses => 25,
        EdgeType::MentoredBy | EdgeType::LearnedFrom => 22,
        EdgeType::EnabledBy | EdgeType::SupportedBy => 20,
        EdgeType::EvolvedInto => 18,
        EdgeType::CompoundsInto | EdgeType::Unlocks => 15,
        EdgeType::CapabilityExpansion => 12,
        EdgeType::CrossPollinated | EdgeType::FuturePath => 10,
    }
}

/// Compute the confidence of an edge against current graph state.
///
/// Scoring algorithm:
/// - source_reliability: average endpoint reliability (verified 50,
///   inferred 30, pending 15, rejected 0)
/// - edge_type_base: 10-30 per relation kind
/// - evidence_boost: 5 per attached evidence item, max 20
/// - co_occurrence_boost: 5 per independent two-hop path between the
///   endpoints (direction-blind, direct edge excluded), max 20
/// - total clamped to 100
///
/// All arithmetic uses saturating/widened integer operations.
#[must_use]
pub fn score_edge(edge: &Edge, graph: &UniverseGraph) -> EdgeConfidence {
    let source_status = graph
        .node(&edge.source)
        .map_or(VerificationStatus::Rejected, |n| n.verification_status);
    let target_status = graph
        .node(&edge.target)
        .map_or(VerificationStatus::Rejected, |n| n.verification_status);

    let source_reliability =
        (u16::from(node_reliability(source_status)) + u16::from(node_reliability(target_status)))
            / 2;

    let base = edge_type_base(edge.edge_type);

    let evidence_boost = (edge.evidence.len().min(255) as u16).saturating_mul(5).min(20);

    let co_occurrence = co_occurrence_paths(edge, graph);
    let co_occurrence_boost = (co_occurrence.min(255) as u16).saturating_mul(5).min(20);

    let total: u16 = source_reliability
        .saturating_add(u16::from(base))
        .saturating_add(evidence_boost)
        .saturating_add(co_occurrence_boost);

    let breakdown = ConfidenceBreakdown {
        source_reliability: source_reliability as u8,
        edge_type_base: base,
        evidence_boost: evidence_boost as u8,
        co_occurrence_boost: co_occurrence_boost as u8,
        pre_clamp_total: total,
    };

    EdgeConfidence {
        score: total.min(100) as u8,
        breakdown,
    }
}

/// Count independent two-hop paths between an edge's endpoints.
///
/// A path is a third node adjacent (either direction) to both
/// endpoints. The direct edge never counts because the endpoints
/// themselves are excluded.
#[must_use]
pub fn co_occurrence_paths(edge: &Edge, graph: &UniverseGraph) -> usize {
    let source_neighbors = graph.neighbors_undirected(&edge.source);
    let target_neighbors = graph.neighbors_undirected(&edge.target);
    source_neighbors
        .intersection(&target_neighbors)
        .filter(|n| **n != edge.source && **n != edge.target)
        .count()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvidenceItem, MonthStamp, Node, NodeType};
    use chrono::{DateTime, Utc};

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn stamp() -> MonthStamp {
        MonthStamp::parse("2025-01").expect("stamp")
    }

    fn node_with_status(id: &str, status: VerificationStatus) -> Node {
        let mut node = Node::new(id, id, NodeType::Project, stamp(), epoch());
        node.verification_status = status;
        node
    }

    fn graph_with_edge(
        source_status: VerificationStatus,
        target_status: VerificationStatus,
        edge_type: EdgeType,
    ) -> (UniverseGraph, Edge) {
        let mut graph = UniverseGraph::new();
        graph.insert_node(node_with_status("a", source_status));
        graph.insert_node(node_with_status("b", target_status));
        let edge = Edge::new("e1", "a", "b", edge_type, epoch());
        assert!(graph.insert_edge(edge.clone()));
        (graph, edge)
    }

    #[test]
    fn verified_endpoints_built_with() {
        let (graph, edge) = graph_with_edge(
            VerificationStatus::Verified,
            VerificationStatus::Verified,
            EdgeType::BuiltWith,
        );
        let confidence = score_edge(&edge, &graph);

        // (50+50)/2 + 30 + 0 + 0 = 80
        assert_eq!(confidence.score, 80);
        assert_eq!(confidence.breakdown.source_reliability, 50);
        assert_eq!(confidence.breakdown.edge_type_base, 30);
        assert!(confidence.is_high());
        assert_eq!(confidence.band(), "high");
    }

    #[test]
    fn pending_endpoints_speculative_relation() {
        let (graph, edge) = graph_with_edge(
            VerificationStatus::Pending,
            VerificationStatus::Pending,
            EdgeType::FuturePath,
        );
        let confidence = score_edge(&edge, &graph);

        // (15+15)/2 + 10 = 25
        assert_eq!(confidence.score, 25);
        assert!(confidence.is_low());
        assert_eq!(confidence.band(), "low");
    }

    #[test]
    fn mixed_endpoint_reliability_averages() {
        let (graph, edge) = graph_with_edge(
            VerificationStatus::Verified,
            VerificationStatus::Pending,
            EdgeType::Uses,
        );
        let confidence = score_edge(&edge, &graph);

        // (50+15)/2 = 32, + 25 = 57
        assert_eq!(confidence.breakdown.source_reliability, 32);
        assert_eq!(confidence.score, 57);
        assert_eq!(confidence.band(), "medium");
    }

    #[test]
    fn rejected_endpoint_contributes_nothing() {
        let (graph, edge) = graph_with_edge(
            VerificationStatus::Rejected,
            VerificationStatus::Verified,
            EdgeType::BuiltWith,
        );
        let confidence = score_edge(&edge, &graph);

        // (0+50)/2 + 30 = 55
        assert_eq!(confidence.breakdown.source_reliability, 25);
        assert_eq!(confidence.score, 55);
    }

    #[test]
    fn evidence_boost_caps_at_twenty() {
        let (mut graph, mut edge) = graph_with_edge(
            VerificationStatus::Pending,
            VerificationStatus::Pending,
            EdgeType::BuiltWith,
        );
        edge.evidence = (0..6).map(|i| EvidenceItem::new(format!("proof {i}"))).collect();
        assert!(graph.insert_edge(edge.clone()));

        let confidence = score_edge(&edge, &graph);
        // 6 items * 5 = 30, capped at 20
        assert_eq!(confidence.breakdown.evidence_boost, 20);
        // 15 + 30 + 20 = 65
        assert_eq!(confidence.score, 65);
    }

    #[test]
    fn co_occurrence_counts_common_neighbors() {
        let (mut graph, edge) = graph_with_edge(
            VerificationStatus::Pending,
            VerificationStatus::Pending,
            EdgeType::BuiltWith,
        );
        // A third node adjacent to both endpoints forms one 2-hop path.
        graph.insert_node(node_with_status("m", VerificationStatus::Pending));
        assert!(graph.insert_edge(Edge::new("e2", "a", "m", EdgeType::Uses, epoch())));
        assert!(graph.insert_edge(Edge::new("e3", "m", "b", EdgeType::Uses, epoch())));

        assert_eq!(co_occurrence_paths(&edge, &graph), 1);
        let confidence = score_edge(&edge, &graph);
        assert_eq!(confidence.breakdown.co_occurrence_boost, 5);
        // 15 + 30 + 0 + 5 = 50
        assert_eq!(confidence.score, 50);
    }

    #[test]
    fn direct_edge_never_counts_as_co_occurrence() {
        let (graph, edge) = graph_with_edge(
            VerificationStatus::Verified,
            VerificationStatus::Verified,
            EdgeType::BuiltWith,
        );
        assert_eq!(co_occurrence_paths(&edge, &graph), 0);
    }

    #[test]
    fn total_clamps_at_one_hundred() {
        let (mut graph, mut edge) = graph_with_edge(
            VerificationStatus::Verified,
            VerificationStatus::Verified,
            EdgeType::BuiltWith,
        );
        edge.evidence = (0..4).map(|i| EvidenceItem::new(format!("proof {i}"))).collect();
        assert!(graph.insert_edge(edge.clone()));
        // Four independent 2-hop paths max out co-occurrence.
        for i in 0..4 {
            let mid = format!("m{i}");
            graph.insert_node(node_with_status(&mid, VerificationStatus::Verified));
            assert!(graph.insert_edge(Edge::new(
                format!("ea{i}"),
                "a",
                mid.clone(),
                EdgeType::Uses,
                epoch(),
            )));
            assert!(graph.insert_edge(Edge::new(
                format!("eb{i}"),
                mid,
                "b",
                EdgeType::Uses,
                epoch(),
            )));
        }

        let confidence = score_edge(&edge, &graph);
        // 50 + 30 + 20 + 20 = 120, clamped
        assert_eq!(confidence.breakdown.evidence_boost, 20);
        assert_eq!(confidence.breakdown.co_occurrence_boost, 20);
        assert_eq!(confidence.breakdown.pre_clamp_total, 120);
        assert_eq!(confidence.score, 100);
    }

    #[test]
    fn band_boundaries() {
        let breakdown = ConfidenceBreakdown {
            source_reliability: 0,
            edge_type_base: 0,
            evidence_boost: 0,
            co_occurrence_boost: 0,
            pre_clamp_total: 0,
        };
        let at_high = EdgeConfidence { score: 70, breakdown };
        let below_high = EdgeConfidence { score: 69, breakdown };
        let at_low = EdgeConfidence { score: 50, breakdown };
        let below_low = EdgeConfidence { score: 49, breakdown };

        assert_eq!(at_high.band(), "high");
        assert_eq!(below_high.band(), "medium");
        assert_eq!(at_low.band(), "medium");
        assert_eq!(below_low.band(), "low");
    }

    #[test]
    fn every_edge_type_base_in_range() {
        let all = [
            EdgeType::BuiltWith,
            EdgeType::LearnedFrom,
            EdgeType::EnabledBy,
            EdgeType::PresentedAt,
            EdgeType::WonAt,
            EdgeType::SupportedBy,
            EdgeType::EndorsedBy,
            EdgeType::EvolvedInto,
            EdgeType::CrossPollinated,
            EdgeType::CapabilityExpansion,
            EdgeType::FuturePath,
            EdgeType::CompoundsInto,
            EdgeType::MentoredBy,
            EdgeType::Uses,
            EdgeType::Unlocks,
        ];
        for edge_type in all {
            let base = edge_type_base(edge_type);
            assert!((10..=30).contains(&base), "{edge_type:?} base {base}");
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let (graph, edge) = graph_with_edge(
            VerificationStatus::Inferred,
            VerificationStatus::Verified,
            EdgeType::EvolvedInto,
        );
        let first = score_edge(&edge, &graph);
        let second = score_edge(&edge, &graph);
        assert_eq!(first, second);
    }
}
