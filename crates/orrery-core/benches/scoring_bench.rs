//! # Scoring Benchmarks
//!
//! Performance benchmarks for the derived-value pipeline: cluster
//! scoring, edge confidence, queue assembly, gap detection, opportunity
//! generation, and canonical export.
//!
//! Run with: `cargo bench -p orrery-core`

use chrono::{DateTime, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use orrery_core::{
    Cluster, ClusterId, Edge, EdgeType, MonthStamp, Node, NodeId, NodeType, UniverseGraph,
    VerificationStatus, export_canonical,
};
use std::hint::black_box;

const CLUSTER_COUNT: usize = 4;

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

fn stamp(i: usize) -> MonthStamp {
    MonthStamp::new(2022 + (i % 4) as i32, 1 + (i % 12) as u8).expect("valid stamp")
}

fn seeded_node(i: usize) -> Node {
    let mut node = Node::new(
        format!("n{i}"),
        format!("Node {i}"),
        [NodeType::Project, NodeType::Skill, NodeType::Event][i % 3],
        stamp(i),
        epoch(),
    );
    node.verification_status = [
        VerificationStatus::Verified,
        VerificationStatus::Pending,
        VerificationStatus::Verified,
        VerificationStatus::Inferred,
    ][i % 4];
    node.growth_weight = (i * 7 % 101) as u8;
    node.impact_score = (i * 13 % 101) as u8;
    node.cluster = Some(ClusterId::new(format!("c{}", i % CLUSTER_COUNT)));
    node
}

/// N nodes spread over four clusters, chained by same-cluster
/// dependency edges. Chains break every 16 nodes so the depth walk
/// stays bounded while still being exercised.
fn create_chained_universe(size: usize) -> UniverseGraph {
    let mut graph = UniverseGraph::new();
    for c in 0..CLUSTER_COUNT {
        graph.insert_cluster(Cluster::new(format!("c{c}"), format!("Cluster {c}"), "#888888"));
    }

    for i in 0..size {
        let mut node = seeded_node(i);
        if i >= CLUSTER_COUNT && (i / CLUSTER_COUNT) % 16 != 0 {
            node.dependencies.insert(NodeId::new(format!("n{}", i - CLUSTER_COUNT)));
        }
        graph.insert_node(node);
    }

    for i in CLUSTER_COUNT..size {
        // Same-cluster predecessor: internal edge. Immediate
        // predecessor: usually cross-cluster.
        graph.insert_edge(Edge::new(
            format!("e{i}"),
            format!("n{}", i - CLUSTER_COUNT),
            format!("n{i}"),
            EdgeType::EnabledBy,
            epoch(),
        ));
        if i % 3 == 0 {
            graph.insert_edge(Edge::new(
                format!("x{i}"),
                format!("n{}", i - 1),
                format!("n{i}"),
                EdgeType::CrossPollinated,
                epoch(),
            ));
        }
    }

    graph
}

/// A verified person connected to every other node (hub-and-spoke).
fn create_star_universe(size: usize) -> UniverseGraph {
    let mut graph = UniverseGraph::new();
    for c in 0..CLUSTER_COUNT {
        graph.insert_cluster(Cluster::new(format!("c{c}"), format!("Cluster {c}"), "#888888"));
    }

    let mut hub = Node::new("n0", "Hub", NodeType::Person, stamp(0), epoch());
    hub.verification_status = VerificationStatus::Verified;
    graph.insert_node(hub);

    for i in 1..size {
        graph.insert_node(seeded_node(i));
        graph.insert_edge(Edge::new(
            format!("e{i}"),
            "n0",
            format!("n{i}"),
            EdgeType::BuiltWith,
            epoch(),
        ));
    }

    graph
}

fn bench_now() -> MonthStamp {
    MonthStamp::parse("2026-01").expect("valid stamp")
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_score_all_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_all_clusters");

    for size in [100, 1000, 10000].iter() {
        let graph = create_chained_universe(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(orrery_core::scoring::score_all_clusters(&graph, bench_now())));
        });
    }

    group.finish();
}

fn bench_edge_confidence(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_confidence");

    for size in [100, 1000, 10000].iter() {
        let graph = create_chained_universe(*size);
        let edge = graph
            .edge(&orrery_core::EdgeId::new(format!("e{}", size / 2)))
            .expect("middle edge");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(orrery_core::confidence::score_edge(edge, &graph)));
        });
    }

    group.finish();
}

fn bench_verification_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("verification_queue");

    for size in [100, 1000, 10000].iter() {
        let graph = create_star_universe(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(orrery_core::verification::build_queue(&graph)));
        });
    }

    group.finish();
}

fn bench_gap_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("gap_detection");
    let config = orrery_core::GapConfig::default();

    for size in [100, 1000, 10000].iter() {
        let graph = create_chained_universe(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(orrery_core::gaps::detect_gaps(
                    &graph,
                    bench_now(),
                    &config,
                    epoch(),
                ))
            });
        });
    }

    group.finish();
}

fn bench_opportunity_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("opportunity_generation");

    for size in [100, 500, 1000].iter() {
        let graph = create_star_universe(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(orrery_core::opportunity::generate_graph_opportunities(
                    &graph,
                    bench_now(),
                    epoch(),
                ))
            });
        });
    }

    group.finish();
}

fn bench_export_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_canonical");

    for size in [100, 500, 1000].iter() {
        let graph = create_chained_universe(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(export_canonical(&graph)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_score_all_clusters,
    bench_edge_confidence,
    bench_verification_queue,
    bench_gap_detection,
    bench_opportunity_generation,
    bench_export_canonical,
);

criterion_main!(benches);
