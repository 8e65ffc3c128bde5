//! # Property-Based Tests
//!
//! Proptest coverage for the invariants the engine promises: scoring is
//! deterministic and bounded, moderation terminal states absorb every
//! later action, and both byte formats round-trip bit-exactly.

use chrono::{DateTime, Duration, Utc};
use orrery_core::{
    Cluster, ClusterId, Edge, EdgeType, EntityKind, ModerationAction, MonthStamp, Node, NodeId,
    NodeType, UniverseGraph, VerificationStatus, export_canonical, graph_from_bytes,
    graph_to_bytes, import_canonical, verify_canonical,
};
use proptest::collection::vec;
use proptest::prelude::*;

// =============================================================================
// SEEDED GRAPH CONSTRUCTION
// =============================================================================

const STATUSES: [VerificationStatus; 4] = [
    VerificationStatus::Pending,
    VerificationStatus::Verified,
    VerificationStatus::Inferred,
    VerificationStatus::Rejected,
];

const NODE_TYPES: [NodeType; 6] = [
    NodeType::Person,
    NodeType::Project,
    NodeType::Skill,
    NodeType::Event,
    NodeType::Organization,
    NodeType::Award,
];

const EDGE_TYPES: [EdgeType; 5] = [
    EdgeType::BuiltWith,
    EdgeType::Uses,
    EdgeType::LearnedFrom,
    EdgeType::PresentedAt,
    EdgeType::FuturePath,
];

fn created(seed: u16) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + Duration::days(i64::from(seed))
}

/// Every node attribute is a pure function of the seed, so two graphs
/// built from the same seed list are identical.
fn seeded_node(seed: u16) -> Node {
    let mut node = Node::new(
        format!("n{seed}"),
        format!("Node {seed}"),
        NODE_TYPES[usize::from(seed) % NODE_TYPES.len()],
        MonthStamp::new(2020 + i32::from(seed % 6), 1 + (seed % 12) as u8).expect("valid stamp"),
        created(seed),
    );
    node.verification_status = STATUSES[usize::from(seed) % STATUSES.len()];
    node.growth_weight = (seed % 101) as u8;
    node.impact_score = (seed.wrapping_mul(7) % 101) as u8;
    if seed % 3 != 0 {
        node.cluster = Some(ClusterId::new(format!("c{}", seed % 4)));
    }
    node
}

fn seeded_graph(node_seeds: &[u16], edge_pairs: &[(u16, u16)]) -> UniverseGraph {
    let mut graph = UniverseGraph::new();
    for c in 0..4u16 {
        graph.insert_cluster(Cluster::new(
            format!("c{c}"),
            format!("Cluster {c}"),
            "#888888",
        ));
    }
    for &seed in node_seeds {
        graph.insert_node(seeded_node(seed));
    }
    let ids: Vec<NodeId> = graph.nodes().map(|n| n.id.clone()).collect();
    for (i, &(a, b)) in edge_pairs.iter().enumerate() {
        let source = &ids[usize::from(a) % ids.len()];
        let target = &ids[usize::from(b) % ids.len()];
        let mut edge = Edge::new(
            format!("e{i}"),
            source.as_str(),
            target.as_str(),
            EDGE_TYPES[i % EDGE_TYPES.len()],
            created(a.wrapping_add(b)),
        );
        edge.verification_status = STATUSES[usize::from(a ^ b) % STATUSES.len()];
        edge.weight = 1 + (a.wrapping_mul(3).wrapping_add(b) % 100) as u8;
        // Self-loops and duplicate ids are silently dropped or replaced
        // by the graph; the graph itself stays the source of truth.
        graph.insert_edge(edge);
    }
    graph
}

fn node_seed_strategy() -> impl Strategy<Value = Vec<u16>> {
    vec(0u16..500, 1..40)
}

fn edge_pair_strategy() -> impl Strategy<Value = Vec<(u16, u16)>> {
    vec((0u16..64, 0u16..64), 0..60)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Two graphs built from the same seeds score identically.
    #[test]
    fn scoring_is_deterministic(
        node_seeds in node_seed_strategy(),
        edge_pairs in edge_pair_strategy(),
    ) {
        let now = MonthStamp::parse("2026-03").expect("valid stamp");
        let first = seeded_graph(&node_seeds, &edge_pairs);
        let second = seeded_graph(&node_seeds, &edge_pairs);

        prop_assert_eq!(first.node_count(), second.node_count());
        prop_assert_eq!(first.edge_count(), second.edge_count());
        prop_assert_eq!(
            orrery_core::scoring::score_all_clusters(&first, now),
            orrery_core::scoring::score_all_clusters(&second, now)
        );
    }

    /// Every cluster metric stays inside its documented band, whatever
    /// the graph looks like.
    #[test]
    fn cluster_scores_stay_in_bounds(
        node_seeds in node_seed_strategy(),
        edge_pairs in edge_pair_strategy(),
    ) {
        let now = MonthStamp::parse("2026-03").expect("valid stamp");
        let graph = seeded_graph(&node_seeds, &edge_pairs);

        for metrics in orrery_core::scoring::score_all_clusters(&graph, now).values() {
            prop_assert!(metrics.score <= 100);
            prop_assert!((1..=5).contains(&metrics.level));
            prop_assert!(metrics.components.complexity <= 100);
            prop_assert!(metrics.components.cross_cluster <= 100);
            prop_assert!(metrics.components.recency <= 100);
            prop_assert!(metrics.components.validation <= 100);
            prop_assert!(metrics.components.depth <= 100);
            prop_assert!(
                ["high", "growing", "active", "slow"].contains(&metrics.velocity_label())
            );
        }
    }

    /// The level band is a step function of the score and never leaves 1-5.
    #[test]
    fn level_tracks_score_bands(score in 0u8..=100) {
        let level = orrery_core::scoring::level_for_score(score);
        prop_assert!((1..=5).contains(&level));
        if score < 100 {
            prop_assert!(orrery_core::scoring::level_for_score(score + 1) >= level);
        }
    }

    /// An edge confidence equals the clamped sum of its own breakdown,
    /// and each factor respects its maximum.
    #[test]
    fn confidence_matches_its_breakdown(
        node_seeds in node_seed_strategy(),
        edge_pairs in edge_pair_strategy(),
    ) {
        let graph = seeded_graph(&node_seeds, &edge_pairs);

        for edge in graph.edges() {
            let confidence = orrery_core::confidence::score_edge(edge, &graph);
            let b = confidence.breakdown;
            prop_assert!(b.source_reliability <= 50);
            prop_assert!(b.edge_type_base <= 30);
            prop_assert!(b.evidence_boost <= 20);
            prop_assert!(b.co_occurrence_boost <= 20);

            let sum = u16::from(b.source_reliability)
                + u16::from(b.edge_type_base)
                + u16::from(b.evidence_boost)
                + u16::from(b.co_occurrence_boost);
            prop_assert_eq!(b.pre_clamp_total, sum);
            prop_assert_eq!(u16::from(confidence.score), sum.min(100));
            prop_assert_eq!(confidence.is_high(), confidence.score >= 70);
            prop_assert_eq!(confidence.is_low(), confidence.score < 50);
        }
    }

    /// Filled plus missing always covers the whole checklist, and the
    /// complete flag fires exactly at the threshold.
    #[test]
    fn completeness_checklist_adds_up(seed in 0u16..5000) {
        let report = orrery_core::scoring::node_completeness(&seeded_node(seed));
        prop_assert_eq!(
            usize::from(report.filled) + report.missing.len(),
            usize::from(orrery_core::scoring::COMPLETENESS_FIELDS)
        );
        prop_assert!(report.score <= 100);
        prop_assert_eq!(
            report.complete,
            report.filled >= orrery_core::scoring::COMPLETENESS_THRESHOLD
        );
    }

    /// ROI never exceeds 100 and never decreases when priority rises.
    #[test]
    fn roi_is_bounded_and_monotone(priority in 0u8..=100, effort in 0u8..=100) {
        let roi = orrery_core::scoring::roi_score(priority, effort);
        prop_assert!(roi <= 100);
        if priority < 100 {
            prop_assert!(orrery_core::scoring::roi_score(priority + 1, effort) >= roi);
        }
    }

    /// Once a node reaches a terminal status, no later action sequence
    /// moves it again, and `changed` reports exactly the real flips.
    #[test]
    fn terminal_statuses_absorb_all_actions(actions in vec(0u8..3, 1..20)) {
        let mut graph = UniverseGraph::new();
        graph.insert_node(seeded_node(0));

        let mut reached_terminal = false;
        for &pick in &actions {
            let action = match pick {
                0 => ModerationAction::Approve,
                1 => ModerationAction::Reject,
                _ => ModerationAction::Defer,
            };
            let before = graph.node(&NodeId::new("n0")).expect("node").verification_status;
            let outcome =
                orrery_core::verification::apply_action(&mut graph, EntityKind::Node, "n0", action)
                    .expect("apply");
            let after = graph.node(&NodeId::new("n0")).expect("node").verification_status;

            prop_assert_eq!(outcome.previous, before);
            prop_assert_eq!(outcome.current, after);
            prop_assert_eq!(outcome.changed, before != after);
            if reached_terminal {
                prop_assert!(!outcome.changed);
                prop_assert_eq!(after, before);
            }
            reached_terminal = reached_terminal || after.is_terminal();
        }
    }

    /// Export, import, and re-export produce bit-identical snapshots.
    #[test]
    fn canonical_export_roundtrips(
        node_seeds in node_seed_strategy(),
        edge_pairs in edge_pair_strategy(),
    ) {
        let graph = seeded_graph(&node_seeds, &edge_pairs);
        let data = export_canonical(&graph).expect("export");
        let imported = import_canonical(&data).expect("import");

        prop_assert_eq!(imported.node_count(), graph.node_count());
        prop_assert_eq!(imported.edge_count(), graph.edge_count());
        prop_assert_eq!(export_canonical(&imported).expect("re-export"), data.clone());
        prop_assert!(verify_canonical(&graph, &data).expect("verify"));
    }

    /// The persistence format round-trips bit-exactly as well.
    #[test]
    fn persistence_bytes_roundtrip(
        node_seeds in node_seed_strategy(),
        edge_pairs in edge_pair_strategy(),
    ) {
        let graph = seeded_graph(&node_seeds, &edge_pairs);
        let bytes = graph_to_bytes(&graph).expect("serialize");
        let restored = graph_from_bytes(&bytes).expect("deserialize");

        prop_assert_eq!(restored.node_count(), graph.node_count());
        prop_assert_eq!(restored.edge_count(), graph.edge_count());
        prop_assert_eq!(graph_to_bytes(&restored).expect("re-serialize"), bytes);
    }

    /// The verification queue never lists terminal entries and keeps
    /// nodes in newest-first order.
    #[test]
    fn queue_lists_only_open_work(
        node_seeds in node_seed_strategy(),
        edge_pairs in edge_pair_strategy(),
    ) {
        let graph = seeded_graph(&node_seeds, &edge_pairs);
        let queue = orrery_core::verification::build_queue(&graph);

        for node in &queue.pending_nodes {
            prop_assert_eq!(node.verification_status, VerificationStatus::Pending);
        }
        for window in queue.pending_nodes.windows(2) {
            let (earlier, later) = (&window[0], &window[1]);
            prop_assert!(
                earlier.created_at > later.created_at
                    || (earlier.created_at == later.created_at && earlier.id <= later.id)
            );
        }
        for entry in &queue.pending_edges {
            prop_assert!(!entry.edge.verification_status.is_terminal());
        }
        for window in queue.pending_edges.windows(2) {
            prop_assert!(window[0].confidence.score >= window[1].confidence.score);
        }
    }
}
