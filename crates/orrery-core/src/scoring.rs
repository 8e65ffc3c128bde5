//! # Scoring Engine
//!
//! Pure derivation of cluster metrics and node completeness.
//!
//! - All arithmetic is integer; percent components are 0-100
//! - Velocity is expressed in hundredths of nodes/month to avoid fractions
//! - Rejected nodes and edges are excluded from every computation
//! - Scoring takes the clock as a `MonthStamp` argument and never reads
//!   time itself; identical input always yields identical output

use crate::graph::UniverseGraph;
use crate::primitives::MAX_CHAIN_DEPTH;
use crate::types::{ClusterId, MonthStamp, Node, NodeId, VerificationStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Component weights, in integer per-cent.
pub const WEIGHT_COMPLEXITY: u32 = 25;
pub const WEIGHT_CROSS_CLUSTER: u32 = 20;
pub const WEIGHT_RECENCY: u32 = 20;
pub const WEIGHT_VALIDATION: u32 = 20;
pub const WEIGHT_DEPTH: u32 = 15;

/// Months after which a cluster's newest node no longer contributes recency.
pub const RECENCY_HORIZON_MONTHS: u32 = 24;

/// Trailing window for velocity, in months.
pub const VELOCITY_WINDOW_MONTHS: u32 = 3;

/// Number of fields in the completeness checklist.
pub const COMPLETENESS_FIELDS: u8 = 8;

/// Filled fields required for a node to count as complete.
pub const COMPLETENESS_THRESHOLD: u8 = 5;

/// The cluster scoring formula, verbatim, for display next to breakdowns.
pub const SCORE_FORMULA: &str =
    "(25*complexity + 20*cross_cluster + 20*recency + 20*validation + 15*depth) / 100";

/// Per-component contributions to a cluster score, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Node and internal-edge count with saturation.
    pub complexity: u8,
    /// Share of touching edges that leave the cluster.
    pub cross_cluster: u8,
    /// Linear decay from the newest member node.
    pub recency: u8,
    /// Verified fraction of member nodes plus internal edges.
    pub validation: u8,
    /// Longest dependency chain among members.
    pub depth: u8,
}

/// Derived metrics for one cluster. Never stored; recomputed per read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    /// Band 1-5, a step function of `score`.
    pub level: u8,
    /// Weighted total, 0-100.
    pub score: u8,
    /// Hundredths of nodes/month over the trailing window, never negative.
    pub velocity: u32,
    /// Member nodes counted (rejected excluded).
    pub node_count: usize,
    /// Where the score came from.
    pub components: ScoreComponents,
}

impl ClusterMetrics {
    /// Velocity band name, total over all values.
    #[must_use]
    pub const fn velocity_label(&self) -> &'static str {
        velocity_label(self.velocity)
    }
}

/// Completeness verdict for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completeness {
    /// Fields filled, 0-8.
    pub filled: u8,
    /// `filled >= 5`.
    pub complete: bool,
    /// `round(100 * filled / 8)`, half up.
    pub score: u8,
    /// Names of the unfilled fields, in checklist order.
    pub missing: Vec<&'static str>,
}

/// Map a score to its level band: `clamp(floor(score / 20) + 1, 1, 5)`.
#[must_use]
pub const fn level_for_score(score: u8) -> u8 {
    let level = score / 20 + 1;
    if level > 5 { 5 } else { level }
}

/// Velocity band name: high (> 200), growing (> 100), active (> 50), slow.
#[must_use]
pub const fn velocity_label(velocity: u32) -> &'static str {
    if velocity > 200 {
        "high"
    } else if velocity > 100 {
        "growing"
    } else if velocity > 50 {
        "active"
    } else {
        "slow"
    }
}

/// Gap return-on-investment: `min(100, priority * 10 / max(effort, 10))`.
///
/// Effort is floored at 10 so near-zero effort cannot divide the score
/// into absurdity.
#[must_use]
pub const fn roi_score(priority: u8, effort: u8) -> u8 {
    let effort = if effort < 10 { 10 } else { effort };
    let roi = (priority as u32) * 10 / (effort as u32);
    if roi > 100 { 100 } else { roi as u8 }
}

/// Compute derived metrics for one cluster.
///
/// Scoring algorithm:
/// - complexity: `min(100, min(60, nodes*6) + min(40, internal_edges*4))`
/// - cross_cluster: `external*100 / total` over edges touching the
///   cluster (0 when no edges touch it)
/// - recency: `100 - min(100, months_since_latest*100 / 24)`
/// - validation: `verified*100 / total` over member nodes plus internal
///   edges
/// - depth: `min(100, longest_dependency_chain_hops * 25)`, cycle-guarded
/// - score: weighted sum over 100; level: `floor(score/20) + 1` clamped
///   to 1-5
/// - velocity: members stamped in the trailing 3-month window, `count*100/3`
#[must_use]
pub fn score_cluster(cluster_id: &ClusterId, graph: &UniverseGraph, now: MonthStamp) -> ClusterMetrics {
    let members: Vec<&Node> = graph
        .cluster_nodes(cluster_id)
        .filter(|n| n.verification_status != VerificationStatus::Rejected)
        .collect();
    let member_ids: BTreeSet<&NodeId> = members.iter().map(|n| &n.id).collect();

    // Edge partition: internal (both endpoints members) vs external
    // (exactly one endpoint a member). Rejected edges are invisible.
    let mut internal_edges: u32 = 0;
    let mut external_edges: u32 = 0;
    let mut verified_internal_edges: u32 = 0;
    for edge in graph.edges() {
        if edge.verification_status == VerificationStatus::Rejected {
            continue;
        }
        let source_in = member_ids.contains(&edge.source);
        let target_in = member_ids.contains(&edge.target);
        match (source_in, target_in) {
            (true, true) => {
                internal_edges = internal_edges.saturating_add(1);
                if edge.verification_status == VerificationStatus::Verified {
                    verified_internal_edges = verified_internal_edges.saturating_add(1);
                }
            }
            (true, false) | (false, true) => {
                external_edges = external_edges.saturating_add(1);
            }
            (false, false) => {}
        }
    }

    let node_count = members.len() as u32;
    let complexity = (node_count.saturating_mul(6).min(60)
        + internal_edges.saturating_mul(4).min(40))
    .min(100);

    let total_edges = internal_edges + external_edges;
    let cross_cluster = if total_edges == 0 {
        0
    } else {
        external_edges * 100 / total_edges
    };

    let recency = match members.iter().map(|n| n.timestamp).max() {
        Some(latest) => {
            let months = latest.months_since(now);
            100u32.saturating_sub((months.saturating_mul(100) / RECENCY_HORIZON_MONTHS).min(100))
        }
        None => 0,
    };

    let verified_nodes = members
        .iter()
        .filter(|n| n.verification_status == VerificationStatus::Verified)
        .count() as u32;
    let validation_total = node_count + internal_edges;
    let validation = if validation_total == 0 {
        0
    } else {
        (verified_nodes + verified_internal_edges) * 100 / validation_total
    };

    let depth = longest_chain_hops(&member_ids, graph)
        .saturating_mul(25)
        .min(100);

    let components = ScoreComponents {
        complexity: complexity as u8,
        cross_cluster: cross_cluster as u8,
        recency: recency as u8,
        validation: validation as u8,
        depth: depth as u8,
    };

    let score = (WEIGHT_COMPLEXITY * complexity
        + WEIGHT_CROSS_CLUSTER * cross_cluster
        + WEIGHT_RECENCY * recency
        + WEIGHT_VALIDATION * validation
        + WEIGHT_DEPTH * depth)
        / 100;

    let recent = members
        .iter()
        .filter(|n| n.timestamp.months_since(now) < VELOCITY_WINDOW_MONTHS)
        .count() as u32;
    let velocity = recent.saturating_mul(100) / VELOCITY_WINDOW_MONTHS;

    ClusterMetrics {
        level: level_for_score(score as u8),
        score: score as u8,
        velocity,
        node_count: members.len(),
        components,
    }
}

/// Compute metrics for every cluster, keyed by id.
#[must_use]
pub fn score_all_clusters(graph: &UniverseGraph, now: MonthStamp) -> BTreeMap<ClusterId, ClusterMetrics> {
    graph
        .clusters()
        .map(|c| (c.id.clone(), score_cluster(&c.id, graph, now)))
        .collect()
}

/// Longest simple chain over member `dependencies` sets, in hops.
///
/// Only member-to-member links count. A node already on the current path
/// is never re-entered, so cycles terminate; the result is additionally
/// capped at `MAX_CHAIN_DEPTH` hops.
fn longest_chain_hops(members: &BTreeSet<&NodeId>, graph: &UniverseGraph) -> u32 {
    let mut best = 0u32;
    for &id in members {
        let mut visiting = BTreeSet::new();
        best = best.max(chain_from(id, members, graph, &mut visiting));
    }
    best.min(MAX_CHAIN_DEPTH as u32)
}

fn chain_from<'a>(
    id: &'a NodeId,
    members: &BTreeSet<&'a NodeId>,
    graph: &UniverseGraph,
    visiting: &mut BTreeSet<&'a NodeId>,
) -> u32 {
    visiting.insert(id);

    let mut best = 0u32;
    if let Some(node) = graph.node(id) {
        for dep in &node.dependencies {
            if let Some(&member) = members.get(dep) {
                if visiting.contains(member) {
                    continue;
                }
                let below = chain_from(member, members, graph, visiting);
                best = best.max(below.saturating_add(1));
            }
        }
    }

    visiting.remove(id);
    best
}

/// Evaluate the 8-field completeness checklist for a node.
///
/// Checklist order: description, why_it_matters, evidence, unlocked,
/// enables, gaps, ways_to_help, url.
#[must_use]
pub fn node_completeness(node: &Node) -> Completeness {
    let mut missing = Vec::new();
    if !node.description.as_ref().is_some_and(|s| !s.is_empty()) {
        missing.push("description");
    }
    if !node
        .world
        .why_it_matters
        .as_ref()
        .is_some_and(|s| !s.is_empty())
    {
        missing.push("why_it_matters");
    }
    if node.evidence.is_empty() {
        missing.push("evidence");
    }
    if node.world.unlocked.is_empty() {
        missing.push("unlocked");
    }
    if node.world.enables.is_empty() {
        missing.push("enables");
    }
    if node.world.gaps.is_empty() {
        missing.push("gaps");
    }
    if node.world.ways_to_help.is_empty() {
        missing.push("ways_to_help");
    }
    if !node.url.as_ref().is_some_and(|s| !s.is_empty()) {
        missing.push("url");
    }

    let filled = COMPLETENESS_FIELDS.saturating_sub(missing.len() as u8);
    Completeness {
        filled,
        complete: filled >= COMPLETENESS_THRESHOLD,
        // Round half up.
        score: ((u32::from(filled) * 100 + 4) / u32::from(COMPLETENESS_FIELDS)) as u8,
        missing,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, EdgeType, EvidenceItem, NodeType};
    use chrono::{DateTime, Utc};

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn now() -> MonthStamp {
        MonthStamp::parse("2025-08").expect("stamp")
    }

    fn member(id: &str, month: &str, status: VerificationStatus) -> Node {
        let mut node = Node::new(
            id,
            id,
            NodeType::Project,
            MonthStamp::parse(month).expect("stamp"),
            epoch(),
        );
        node.cluster = Some(ClusterId::new("robotics"));
        node.verification_status = status;
        node
    }

    fn robotics() -> ClusterId {
        ClusterId::new("robotics")
    }

    #[test]
    fn empty_cluster_scores_zero() {
        let graph = UniverseGraph::new();
        let metrics = score_cluster(&robotics(), &graph, now());

        assert_eq!(metrics.score, 0);
        assert_eq!(metrics.level, 1);
        assert_eq!(metrics.velocity, 0);
        assert_eq!(metrics.node_count, 0);
    }

    #[test]
    fn level_bands() {
        assert_eq!(level_for_score(0), 1);
        assert_eq!(level_for_score(19), 1);
        assert_eq!(level_for_score(20), 2);
        assert_eq!(level_for_score(40), 3);
        assert_eq!(level_for_score(59), 3);
        assert_eq!(level_for_score(80), 5);
        assert_eq!(level_for_score(100), 5);
    }

    #[test]
    fn velocity_labels() {
        assert_eq!(velocity_label(33), "slow");
        assert_eq!(velocity_label(66), "active");
        assert_eq!(velocity_label(133), "growing");
        assert_eq!(velocity_label(233), "high");
        // Boundaries are strict.
        assert_eq!(velocity_label(200), "growing");
        assert_eq!(velocity_label(100), "active");
        assert_eq!(velocity_label(50), "slow");
    }

    #[test]
    fn validation_counts_verified_fraction() {
        let mut graph = UniverseGraph::new();
        // 3 verified + 2 pending members, no internal edges.
        for i in 0..3 {
            graph.insert_node(member(&format!("v{i}"), "2025-08", VerificationStatus::Verified));
        }
        for i in 0..2 {
            graph.insert_node(member(&format!("p{i}"), "2025-08", VerificationStatus::Pending));
        }

        let metrics = score_cluster(&robotics(), &graph, now());
        // 3 of 5 items verified.
        assert_eq!(metrics.components.validation, 60);
    }

    #[test]
    fn rejected_members_are_invisible() {
        let mut graph = UniverseGraph::new();
        for i in 0..3 {
            graph.insert_node(member(&format!("v{i}"), "2025-08", VerificationStatus::Verified));
        }
        for i in 0..2 {
            graph.insert_node(member(&format!("p{i}"), "2025-08", VerificationStatus::Pending));
        }
        graph.insert_node(member("bad", "2025-08", VerificationStatus::Rejected));

        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.node_count, 5);
        assert_eq!(metrics.components.validation, 60);
    }

    #[test]
    fn complexity_saturates() {
        let mut graph = UniverseGraph::new();
        for i in 0..15 {
            graph.insert_node(member(&format!("n{i:02}"), "2025-08", VerificationStatus::Verified));
        }
        // A chain of internal edges: 14 of them, node part caps at 60,
        // edge part caps at 40.
        for i in 0..14 {
            assert!(graph.insert_edge(Edge::new(
                format!("e{i:02}"),
                format!("n{i:02}"),
                format!("n{:02}", i + 1),
                EdgeType::BuiltWith,
                epoch(),
            )));
        }

        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.components.complexity, 100);
    }

    #[test]
    fn cross_cluster_share() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(member("a", "2025-08", VerificationStatus::Verified));
        graph.insert_node(member("b", "2025-08", VerificationStatus::Verified));
        let mut outside = Node::new("c", "c", NodeType::Project, now(), epoch());
        outside.cluster = Some(ClusterId::new("ai-ml"));
        graph.insert_node(outside);

        // One internal, one leaving the cluster.
        assert!(graph.insert_edge(Edge::new("e1", "a", "b", EdgeType::BuiltWith, epoch())));
        assert!(graph.insert_edge(Edge::new("e2", "a", "c", EdgeType::CrossPollinated, epoch())));

        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.components.cross_cluster, 50);
    }

    #[test]
    fn cross_cluster_zero_without_edges() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(member("a", "2025-08", VerificationStatus::Verified));

        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.components.cross_cluster, 0);
    }

    #[test]
    fn recency_decays_linearly() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(member("a", "2024-08", VerificationStatus::Verified));

        // 12 of 24 months elapsed.
        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.components.recency, 50);
    }

    #[test]
    fn recency_zero_beyond_horizon() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(member("a", "2020-01", VerificationStatus::Verified));

        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.components.recency, 0);
    }

    #[test]
    fn depth_follows_dependency_chains() {
        let mut graph = UniverseGraph::new();
        let mut a = member("a", "2025-08", VerificationStatus::Verified);
        let mut b = member("b", "2025-08", VerificationStatus::Verified);
        let c = member("c", "2025-08", VerificationStatus::Verified);
        a.dependencies.insert(NodeId::new("b"));
        b.dependencies.insert(NodeId::new("c"));
        graph.insert_node(a);
        graph.insert_node(b);
        graph.insert_node(c);

        // a -> b -> c is 2 hops.
        let metrics = score_cluster(&robotics(), &graph, now());
        assert_eq!(metrics.components.depth, 50);
    }

    #[test]
    fn depth_survives_cycles() {
        let mut graph = UniverseGraph::new();
        let mut a = member("a", "2025-08", VerificationStatus::Verified);
        let mut b = member("b", "2025-08", VerificationStatus::Verified);
        a.dependencies.insert(NodeId::new("b"));
        b.dependencies.insert(NodeId::new("a"));
        graph.insert_node(a);
        graph.insert_node(b);

        let metrics = score_cluster(&robotics(), &graph, now());
        // The cycle contributes a single hop from either entry point.
        assert_eq!(metrics.components.depth, 25);
    }

    #[test]
    fn velocity_counts_trailing_window() {
        let mut graph = UniverseGraph::new();
        // Inside the window: this month and two months back.
        graph.insert_node(member("a", "2025-08", VerificationStatus::Verified));
        graph.insert_node(member("b", "2025-06", VerificationStatus::Verified));
        // Outside: exactly three months back.
        graph.insert_node(member("c", "2025-05", VerificationStatus::Verified));

        let metrics = score_cluster(&robotics(), &graph, now());
        // 2 * 100 / 3
        assert_eq!(metrics.velocity, 66);
        assert_eq!(metrics.velocity_label(), "active");
    }

    #[test]
    fn worked_example_score() {
        let mut graph = UniverseGraph::new();
        for i in 0..3 {
            graph.insert_node(member(&format!("v{i}"), "2025-08", VerificationStatus::Verified));
        }
        for i in 0..2 {
            graph.insert_node(member(&format!("p{i}"), "2025-08", VerificationStatus::Pending));
        }

        let metrics = score_cluster(&robotics(), &graph, now());
        // complexity 30, cross 0, recency 100, validation 60, depth 0
        // (25*30 + 20*0 + 20*100 + 20*60 + 15*0) / 100 = 39
        assert_eq!(metrics.components.complexity, 30);
        assert_eq!(metrics.components.recency, 100);
        assert_eq!(metrics.score, 39);
        assert_eq!(metrics.level, 2);
    }

    #[test]
    fn scoring_is_pure() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(member("a", "2025-03", VerificationStatus::Verified));
        graph.insert_node(member("b", "2024-11", VerificationStatus::Pending));

        let first = score_cluster(&robotics(), &graph, now());
        let second = score_cluster(&robotics(), &graph, now());
        assert_eq!(first, second);
    }

    #[test]
    fn completeness_threshold_and_rounding() {
        let mut node = Node::new("x", "X", NodeType::Project, now(), epoch());
        node.description = Some("a robot game".to_string());
        node.url = Some("https://example.org".to_string());
        node.evidence.push(EvidenceItem::new("demo video"));
        node.world.unlocked.push("soldering".to_string());

        // 4 of 8: incomplete, rounds to 50.
        let four = node_completeness(&node);
        assert_eq!(four.filled, 4);
        assert!(!four.complete);
        assert_eq!(four.score, 50);
        assert_eq!(four.missing.len(), 4);

        node.world.why_it_matters = Some("first hardware build".to_string());
        let five = node_completeness(&node);
        assert_eq!(five.filled, 5);
        assert!(five.complete);
        assert_eq!(five.score, 63);

        node.world.enables.push("pcb design".to_string());
        node.world.gaps.push("injection molding".to_string());
        let seven = node_completeness(&node);
        assert_eq!(seven.filled, 7);
        assert_eq!(seven.score, 88);
        assert_eq!(seven.missing, vec!["ways_to_help"]);
    }

    #[test]
    fn completeness_ignores_empty_strings() {
        let mut node = Node::new("x", "X", NodeType::Project, now(), epoch());
        node.description = Some(String::new());
        let verdict = node_completeness(&node);
        assert!(verdict.missing.contains(&"description"));
        assert_eq!(verdict.filled, 0);
        assert_eq!(verdict.score, 0);
    }

    #[test]
    fn roi_favors_low_effort() {
        assert_eq!(roi_score(80, 20), 40);
        assert_eq!(roi_score(80, 5), 80);
        assert_eq!(roi_score(100, 10), 100);
        // Capped.
        assert_eq!(roi_score(100, 0), 100);
        assert_eq!(roi_score(30, 100), 3);
    }
}
