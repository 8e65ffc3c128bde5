//! # Gap Detector
//!
//! Deterministic scans over the non-rejected graph for four kinds of
//! deficiency: incomplete nodes, weak clusters, missing unlock
//! connections, and stale projects.
//!
//! Gap ids derive from the kind plus the subject id, so re-running
//! detection upserts instead of duplicating. Closed gaps stay closed;
//! manually recorded gaps are never touched.

use crate::graph::UniverseGraph;
use crate::scoring::{self, roi_score};
use crate::types::{
    GapId, GapKind, GapStatus, LearningGap, MonthStamp, NodeStatus, NodeType, VerificationStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Tunable thresholds and per-kind effort estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapConfig {
    /// Clusters scoring below this are weak.
    pub weak_cluster_floor: u8,
    /// Active projects quiet for strictly more months than this are stale.
    pub staleness_months: u32,
    /// Growth weight at or above which a node is expected to unlock
    /// something.
    pub min_growth_weight: u8,
    /// Effort estimate for filling in node fields.
    pub incomplete_effort: u8,
    /// Effort estimate for strengthening a cluster.
    pub weak_cluster_effort: u8,
    /// Effort estimate for wiring a missing connection.
    pub missing_connection_effort: u8,
    /// Effort estimate for reviving a stale project.
    pub stale_project_effort: u8,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            weak_cluster_floor: 40,
            staleness_months: 6,
            min_growth_weight: 60,
            incomplete_effort: 35,
            weak_cluster_effort: 60,
            missing_connection_effort: 30,
            stale_project_effort: 25,
        }
    }
}

/// What a refresh pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GapRefreshOutcome {
    /// Candidates the detectors produced.
    pub detected: usize,
    /// New gaps stored.
    pub inserted: usize,
    /// Existing open gaps re-scored in place.
    pub updated: usize,
    /// Open auto-detected gaps no longer detected, removed.
    pub removed: usize,
    /// Candidates suppressed because the author closed that gap.
    pub skipped_closed: usize,
}

/// The deterministic gap id for a kind and subject.
#[must_use]
pub fn gap_id(kind: GapKind, subject: &str) -> GapId {
    GapId::new(format!("gap-{}-{subject}", kind.as_str()))
}

/// Run all detectors and return the candidate set.
///
/// Candidates are produced in a fixed order (nodes by id per detector,
/// clusters by id) and carry `status = open`, `is_auto_detected = true`.
/// `created_at` is stamped by the caller at refresh time.
#[must_use]
pub fn detect_gaps(
    graph: &UniverseGraph,
    now: MonthStamp,
    config: &GapConfig,
    created_at: DateTime<Utc>,
) -> Vec<LearningGap> {
    let mut gaps = Vec::new();

    // incomplete_node: fails the 5-of-8 completeness rule.
    for node in graph.nodes() {
        if node.verification_status == VerificationStatus::Rejected {
            continue;
        }
        let verdict = scoring::node_completeness(node);
        if verdict.complete {
            continue;
        }
        let missing = verdict.missing.len() as u32;
        let priority = (40 + missing * 5).min(100) as u8;
        let effort = config.incomplete_effort;
        gaps.push(LearningGap {
            id: gap_id(GapKind::IncompleteNode, node.id.as_str()),
            kind: GapKind::IncompleteNode,
            label: format!("{} is missing {missing} of 8 story fields", node.label),
            priority_score: priority,
            effort_score: effort,
            roi_score: roi_score(priority, effort),
            related_nodes: vec![node.id.clone()],
            cluster: node.cluster.clone(),
            status: GapStatus::Open,
            is_auto_detected: true,
            created_at,
        });
    }

    // weak_cluster: score below the configured floor.
    for cluster in graph.clusters() {
        let metrics = scoring::score_cluster(&cluster.id, graph, now);
        if metrics.score >= config.weak_cluster_floor {
            continue;
        }
        let shortfall = u32::from(config.weak_cluster_floor - metrics.score);
        let priority = (50 + shortfall).min(100) as u8;
        let effort = config.weak_cluster_effort;
        gaps.push(LearningGap {
            id: gap_id(GapKind::WeakCluster, cluster.id.as_str()),
            kind: GapKind::WeakCluster,
            label: format!(
                "Strengthen {} (score {} below floor {})",
                cluster.label, metrics.score, config.weak_cluster_floor
            ),
            priority_score: priority,
            effort_score: effort,
            roi_score: roi_score(priority, effort),
            related_nodes: Vec::new(),
            cluster: Some(cluster.id.clone()),
            status: GapStatus::Open,
            is_auto_detected: true,
            created_at,
        });
    }

    // missing_connection: high growth weight but no outgoing unlock-family
    // edge. Rejected edges are invisible to the scan.
    for node in graph.nodes() {
        if node.verification_status == VerificationStatus::Rejected {
            continue;
        }
        if node.growth_weight < config.min_growth_weight {
            continue;
        }
        let has_unlock = graph.edges_from(&node.id).any(|e| {
            e.verification_status != VerificationStatus::Rejected
                && e.edge_type.is_unlock_family()
        });
        if has_unlock {
            continue;
        }
        let priority = node.growth_weight;
        let effort = config.missing_connection_effort;
        gaps.push(LearningGap {
            id: gap_id(GapKind::MissingConnection, node.id.as_str()),
            kind: GapKind::MissingConnection,
            label: format!("{} unlocks nothing yet", node.label),
            priority_score: priority,
            effort_score: effort,
            roi_score: roi_score(priority, effort),
            related_nodes: vec![node.id.clone()],
            cluster: node.cluster.clone(),
            status: GapStatus::Open,
            is_auto_detected: true,
            created_at,
        });
    }

    // stale_project: active projects quiet past the horizon.
    for node in graph.nodes() {
        if node.verification_status == VerificationStatus::Rejected {
            continue;
        }
        if node.node_type != NodeType::Project || node.status != NodeStatus::Active {
            continue;
        }
        let months = node.timestamp.months_since(now);
        if months <= config.staleness_months {
            continue;
        }
        let overdue = months - config.staleness_months;
        let priority = (40 + overdue.saturating_mul(5)).min(100) as u8;
        let effort = config.stale_project_effort;
        gaps.push(LearningGap {
            id: gap_id(GapKind::StaleProject, node.id.as_str()),
            kind: GapKind::StaleProject,
            label: format!("{} has been quiet for {months} months", node.label),
            priority_score: priority,
            effort_score: effort,
            roi_score: roi_score(priority, effort),
            related_nodes: vec![node.id.clone()],
            cluster: node.cluster.clone(),
            status: GapStatus::Open,
            is_auto_detected: true,
            created_at,
        });
    }

    gaps
}

/// Reconcile stored gaps with a fresh candidate set.
///
/// - Open auto-detected gaps not re-detected are removed.
/// - Candidates matching a closed gap are skipped; closed stays closed.
/// - Candidates matching an open gap update its scores and label but
///   keep the original `created_at`.
/// - Manually created gaps are never inserted, updated, or removed here.
pub fn refresh_gaps(
    graph: &mut UniverseGraph,
    now: MonthStamp,
    config: &GapConfig,
    created_at: DateTime<Utc>,
) -> GapRefreshOutcome {
    let candidates = detect_gaps(graph, now, config, created_at);
    let candidate_ids: BTreeSet<GapId> = candidates.iter().map(|g| g.id.clone()).collect();

    let mut outcome = GapRefreshOutcome {
        detected: candidates.len(),
        ..GapRefreshOutcome::default()
    };

    let resolved: Vec<GapId> = graph
        .gaps()
        .filter(|g| {
            g.is_auto_detected && g.status == GapStatus::Open && !candidate_ids.contains(&g.id)
        })
        .map(|g| g.id.clone())
        .collect();
    for id in resolved {
        graph.remove_gap(&id);
        outcome.removed = outcome.removed.saturating_add(1);
    }

    for candidate in candidates {
        match graph.gap_mut(&candidate.id) {
            Some(existing) if existing.status == GapStatus::Closed => {
                outcome.skipped_closed = outcome.skipped_closed.saturating_add(1);
            }
            Some(existing) => {
                existing.label = candidate.label;
                existing.priority_score = candidate.priority_score;
                existing.effort_score = candidate.effort_score;
                existing.roi_score = candidate.roi_score;
                existing.related_nodes = candidate.related_nodes;
                existing.cluster = candidate.cluster;
                outcome.updated = outcome.updated.saturating_add(1);
            }
            None => {
                graph.insert_gap(candidate);
                outcome.inserted = outcome.inserted.saturating_add(1);
            }
        }
    }

    outcome
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cluster, ClusterId, Edge, EdgeType, EvidenceItem, Node};
    use chrono::DateTime;

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn now() -> MonthStamp {
        MonthStamp::parse("2025-08").expect("stamp")
    }

    fn bare_node(id: &str, month: &str) -> Node {
        Node::new(
            id,
            id,
            NodeType::Project,
            MonthStamp::parse(month).expect("stamp"),
            epoch(),
        )
    }

    fn complete_node(id: &str, month: &str) -> Node {
        let mut node = bare_node(id, month);
        node.description = Some("built a thing".to_string());
        node.url = Some("https://example.org".to_string());
        node.evidence.push(EvidenceItem::new("photos"));
        node.world.why_it_matters = Some("first of its kind".to_string());
        node.world.unlocked.push("new skill".to_string());
        node
    }

    fn find<'a>(gaps: &'a [LearningGap], kind: GapKind, subject: &str) -> Option<&'a LearningGap> {
        gaps.iter().find(|g| g.id == gap_id(kind, subject))
    }

    #[test]
    fn incomplete_node_detected() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(bare_node("skeleton", "2025-08"));

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        let gap = find(&gaps, GapKind::IncompleteNode, "skeleton").expect("gap");
        assert_eq!(gap.id.as_str(), "gap-incomplete_node-skeleton");
        // All 8 fields missing: priority 40 + 8*5 = 80, effort 35.
        assert_eq!(gap.priority_score, 80);
        assert_eq!(gap.roi_score, roi_score(80, 35));
        assert!(gap.is_auto_detected);
    }

    #[test]
    fn complete_node_not_flagged() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(complete_node("done", "2025-08"));

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        assert!(find(&gaps, GapKind::IncompleteNode, "done").is_none());
    }

    #[test]
    fn rejected_nodes_are_skipped() {
        let mut graph = UniverseGraph::new();
        let mut node = bare_node("bad", "2025-08");
        node.verification_status = VerificationStatus::Rejected;
        graph.insert_node(node);

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        assert!(gaps.is_empty());
    }

    #[test]
    fn weak_cluster_detected_below_floor() {
        let mut graph = UniverseGraph::new();
        graph.insert_cluster(Cluster::new("thin", "Thin Area", "#888888"));
        // One stale pending member: score well below 40.
        let mut member = bare_node("only", "2020-01");
        member.cluster = Some(ClusterId::new("thin"));
        graph.insert_node(member);

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        let gap = find(&gaps, GapKind::WeakCluster, "thin").expect("gap");
        assert_eq!(gap.cluster, Some(ClusterId::new("thin")));
        assert_eq!(gap.effort_score, 60);
    }

    #[test]
    fn strong_cluster_not_flagged() {
        let mut graph = UniverseGraph::new();
        graph.insert_cluster(Cluster::new("solid", "Solid", "#00ff00"));
        for i in 0..6 {
            let mut member = complete_node(&format!("n{i}"), "2025-08");
            member.cluster = Some(ClusterId::new("solid"));
            member.verification_status = VerificationStatus::Verified;
            graph.insert_node(member);
        }

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        assert!(find(&gaps, GapKind::WeakCluster, "solid").is_none());
    }

    #[test]
    fn missing_connection_needs_growth_weight() {
        let mut graph = UniverseGraph::new();
        let mut heavy = complete_node("heavy", "2025-08");
        heavy.growth_weight = 75;
        graph.insert_node(heavy);
        let mut light = complete_node("light", "2025-08");
        light.growth_weight = 40;
        graph.insert_node(light);

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        let gap = find(&gaps, GapKind::MissingConnection, "heavy").expect("gap");
        assert_eq!(gap.priority_score, 75);
        assert!(find(&gaps, GapKind::MissingConnection, "light").is_none());
    }

    #[test]
    fn unlock_edge_clears_missing_connection() {
        let mut graph = UniverseGraph::new();
        let mut heavy = complete_node("heavy", "2025-08");
        heavy.growth_weight = 75;
        graph.insert_node(heavy);
        graph.insert_node(complete_node("next", "2025-08"));
        assert!(graph.insert_edge(Edge::new("e1", "heavy", "next", EdgeType::Unlocks, epoch())));

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        assert!(find(&gaps, GapKind::MissingConnection, "heavy").is_none());
    }

    #[test]
    fn rejected_unlock_edge_does_not_count() {
        let mut graph = UniverseGraph::new();
        let mut heavy = complete_node("heavy", "2025-08");
        heavy.growth_weight = 75;
        graph.insert_node(heavy);
        graph.insert_node(complete_node("next", "2025-08"));
        let mut edge = Edge::new("e1", "heavy", "next", EdgeType::Unlocks, epoch());
        edge.verification_status = VerificationStatus::Rejected;
        assert!(graph.insert_edge(edge));

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        assert!(find(&gaps, GapKind::MissingConnection, "heavy").is_some());
    }

    #[test]
    fn stale_project_strictly_past_horizon() {
        let mut graph = UniverseGraph::new();
        // 7 months back: stale. Exactly 6: not yet.
        graph.insert_node(complete_node("old", "2025-01"));
        graph.insert_node(complete_node("edge", "2025-02"));

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        let gap = find(&gaps, GapKind::StaleProject, "old").expect("gap");
        // 1 month overdue: priority 45.
        assert_eq!(gap.priority_score, 45);
        assert!(find(&gaps, GapKind::StaleProject, "edge").is_none());
    }

    #[test]
    fn completed_projects_never_stale() {
        let mut graph = UniverseGraph::new();
        let mut done = complete_node("done", "2023-01");
        done.status = NodeStatus::Completed;
        graph.insert_node(done);

        let gaps = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        assert!(find(&gaps, GapKind::StaleProject, "done").is_none());
    }

    #[test]
    fn refresh_inserts_then_updates_without_duplicating() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(bare_node("skeleton", "2025-08"));

        let first = refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());
        assert_eq!(first.inserted, 1);
        assert_eq!(graph.gaps().count(), 1);

        let second = refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(graph.gaps().count(), 1);
    }

    #[test]
    fn refresh_removes_resolved_gaps() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(bare_node("skeleton", "2025-08"));
        refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());

        // Fill the node in; the gap should disappear on the next pass.
        graph.insert_node(complete_node("skeleton", "2025-08"));
        let outcome = refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());
        assert_eq!(outcome.removed, 1);
        assert_eq!(graph.gaps().count(), 0);
    }

    #[test]
    fn closed_gaps_stay_closed() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(bare_node("skeleton", "2025-08"));
        refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());

        let id = gap_id(GapKind::IncompleteNode, "skeleton");
        graph.gap_mut(&id).expect("gap").status = GapStatus::Closed;

        let outcome = refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());
        assert_eq!(outcome.skipped_closed, 1);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(
            graph.gap(&id).map(|g| g.status),
            Some(GapStatus::Closed)
        );
    }

    #[test]
    fn manual_gaps_survive_refresh() {
        let mut graph = UniverseGraph::new();
        graph.insert_gap(LearningGap {
            id: GapId::new("gap-manual-fpga"),
            kind: GapKind::MissingSkill,
            label: "Learn FPGA programming".to_string(),
            priority_score: 70,
            effort_score: 80,
            roi_score: roi_score(70, 80),
            related_nodes: Vec::new(),
            cluster: None,
            status: GapStatus::Open,
            is_auto_detected: false,
            created_at: epoch(),
        });

        let outcome = refresh_gaps(&mut graph, now(), &GapConfig::default(), epoch());
        assert_eq!(outcome.removed, 0);
        assert!(graph.gap(&GapId::new("gap-manual-fpga")).is_some());
    }

    #[test]
    fn detection_is_deterministic() {
        let mut graph = UniverseGraph::new();
        graph.insert_node(bare_node("b", "2025-08"));
        graph.insert_node(bare_node("a", "2025-08"));

        let first = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        let second = detect_gaps(&graph, now(), &GapConfig::default(), epoch());
        let first_ids: Vec<_> = first.iter().map(|g| g.id.as_str()).collect();
        let second_ids: Vec<_> = second.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
        // Node iteration order is id order.
        assert_eq!(
            first_ids,
            vec!["gap-incomplete_node-a", "gap-incomplete_node-b"]
        );
    }
}
