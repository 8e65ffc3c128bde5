//! # Access-Mode View Layer
//!
//! Read-side projections of the graph, shaped per access mode:
//!
//! - `public` sees verified entities only; an edge is visible when it
//!   and both endpoints are verified. Private-only material (learning
//!   gaps, ways_to_help, world gaps, confidence breakdowns, formula
//!   strings, pending stats) is absent from the payload, not null.
//! - `private` sees everything except `partner_context`.
//! - `partner` sees verified data plus `ways_to_help` and a
//!   `partner_context` block on person/organization nodes.
//!
//! Rejected entities are invisible in every mode. Nothing here mutates
//! the graph; the mode is passed in explicitly per call.

use crate::confidence::{self, CONFIDENCE_FORMULA, ConfidenceBreakdown};
use crate::graph::UniverseGraph;
use crate::opportunity;
use crate::scoring::{self, Completeness, SCORE_FORMULA, ScoreComponents};
use crate::types::{
    AccessMode, ClusterId, Edge, EdgeId, EdgeType, EvidenceItem, GapStatus, LearningGap,
    MonthStamp, Node, NodeId, NodeStatus, NodeType, OrreryError, VerificationStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// VIEW SHAPES
// =============================================================================

/// An edge enriched with endpoint labels and recomputed confidence.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeView {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_label: String,
    pub target_label: String,
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub weight: u8,
    pub verification_status: VerificationStatus,
    pub confidence: u8,
    pub confidence_band: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ConfidenceBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<&'static str>,
}

/// A node's world block, mode-projected.
#[derive(Debug, Clone, Serialize)]
pub struct WorldView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why_it_matters: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unlocked: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ways_to_help: Option<Vec<String>>,
}

/// The projected node body inside a detail response.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp: MonthStamp,
    pub year: i32,
    pub growth_weight: u8,
    pub impact_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterId>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<NodeId>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub unlocks: BTreeSet<NodeId>,
    pub status: NodeStatus,
    pub verification_status: VerificationStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceItem>,
    pub world: WorldView,
    pub created_at: DateTime<Utc>,
}

/// Lightweight pointer to a node, for joined lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub label: String,
    pub node_type: NodeType,
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type,
        }
    }
}

/// The cluster a node belongs to, by reference.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterRef {
    pub id: ClusterId,
    pub label: String,
    pub color: String,
}

/// Collaboration block shown to partners on person/organization nodes.
#[derive(Debug, Clone, Serialize)]
pub struct PartnerContext {
    /// How this person or organization could plug in.
    pub ways_to_help: Vec<String>,
    /// Verified completed projects directly connected to them.
    pub relevant_builds: Vec<NodeRef>,
    /// Labels along the verified connection path from the graph owner.
    pub connection_path: Vec<String>,
}

/// Full node detail response body.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDetail {
    pub node: NodeView,
    pub edges: Vec<EdgeView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_gaps: Option<Vec<LearningGap>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_context: Option<PartnerContext>,
}

/// A cluster enriched with derived metrics.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub id: ClusterId,
    pub label: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub level: u8,
    pub score: u8,
    pub velocity: u32,
    pub velocity_label: &'static str,
    /// Member count over mode-visible nodes.
    pub node_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ScoreComponents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<&'static str>,
}

/// Graph-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniverseStats {
    pub total_nodes: usize,
    pub verified_nodes: usize,
    pub total_edges: usize,
    pub verified_edges: usize,
    pub total_clusters: usize,
    pub nodes_by_type: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_edges: Option<usize>,
}

/// A learning gap joined with its cluster's label and color.
#[derive(Debug, Clone, Serialize)]
pub struct GapView {
    #[serde(flatten)]
    pub gap: LearningGap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_color: Option<String>,
}

// =============================================================================
// VISIBILITY
// =============================================================================

/// Whether a node appears at all in the given mode.
#[must_use]
pub fn node_visible(node: &Node, mode: AccessMode) -> bool {
    match node.verification_status {
        VerificationStatus::Rejected => false,
        VerificationStatus::Verified => true,
        VerificationStatus::Pending | VerificationStatus::Inferred => mode.sees_unverified(),
    }
}

/// Whether an edge appears in the given mode. Outside private mode the
/// edge and both endpoints must be verified.
#[must_use]
pub fn edge_visible(graph: &UniverseGraph, edge: &Edge, mode: AccessMode) -> bool {
    if edge.verification_status == VerificationStatus::Rejected {
        return false;
    }
    let endpoint = |id: &NodeId| graph.node(id).filter(|n| node_visible(n, mode));
    let (Some(source), Some(target)) = (endpoint(&edge.source), endpoint(&edge.target)) else {
        return false;
    };
    if mode.sees_unverified() {
        return true;
    }
    edge.verification_status == VerificationStatus::Verified
        && source.verification_status == VerificationStatus::Verified
        && target.verification_status == VerificationStatus::Verified
}

// =============================================================================
// PROJECTIONS
// =============================================================================

fn world_view(node: &Node, mode: AccessMode) -> WorldView {
    let world = &node.world;
    WorldView {
        why_it_matters: world.why_it_matters.clone(),
        unlocked: world.unlocked.clone(),
        enables: world.enables.clone(),
        gaps: mode.sees_private().then(|| world.gaps.clone()),
        ways_to_help: (mode.sees_private() || mode == AccessMode::Partner)
            .then(|| world.ways_to_help.clone()),
    }
}

fn edge_view(graph: &UniverseGraph, edge: &Edge, mode: AccessMode) -> EdgeView {
    let label_of = |id: &NodeId| {
        graph
            .node(id)
            .map_or_else(String::new, |n| n.label.clone())
    };
    let confidence = confidence::score_edge(edge, graph);
    EdgeView {
        id: edge.id.clone(),
        source: edge.source.clone(),
        target: edge.target.clone(),
        source_label: label_of(&edge.source),
        target_label: label_of(&edge.target),
        edge_type: edge.edge_type,
        label: edge.label.clone(),
        weight: edge.weight,
        verification_status: edge.verification_status,
        confidence: confidence.score,
        confidence_band: confidence.band(),
        breakdown: mode.sees_private().then_some(confidence.breakdown),
        formula: mode.sees_private().then_some(CONFIDENCE_FORMULA),
    }
}

/// Assemble the node detail response.
///
/// An unknown id and a node the mode may not see report the same
/// `NotFound`; existence of unverified nodes does not leak to public
/// callers.
pub fn node_detail(
    graph: &UniverseGraph,
    id: &NodeId,
    mode: AccessMode,
) -> Result<NodeDetail, OrreryError> {
    let node = graph
        .node(id)
        .filter(|n| node_visible(n, mode))
        .ok_or_else(|| OrreryError::NotFound(format!("node {:?}", id.as_str())))?;

    let edges: Vec<EdgeView> = graph
        .edges_of(id)
        .filter(|e| edge_visible(graph, e, mode))
        .map(|e| edge_view(graph, e, mode))
        .collect();

    let cluster = node
        .cluster
        .as_ref()
        .and_then(|cid| graph.cluster(cid))
        .map(|c| ClusterRef {
            id: c.id.clone(),
            label: c.label.clone(),
            color: c.color.clone(),
        });

    let completeness = mode
        .sees_private()
        .then(|| scoring::node_completeness(node));

    let learning_gaps = mode.sees_private().then(|| {
        let mut gaps: Vec<LearningGap> = graph
            .gaps()
            .filter(|g| g.status == GapStatus::Open && g.related_nodes.contains(id))
            .cloned()
            .collect();
        sort_gaps(&mut gaps);
        gaps
    });

    let partner_context = (mode == AccessMode::Partner
        && matches!(node.node_type, NodeType::Person | NodeType::Organization))
    .then(|| build_partner_context(graph, node));

    Ok(NodeDetail {
        node: NodeView {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type,
            description: node.description.clone(),
            url: node.url.clone(),
            timestamp: node.timestamp,
            year: node.year,
            growth_weight: node.growth_weight,
            impact_score: node.impact_score,
            cluster: node.cluster.clone(),
            dependencies: node.dependencies.clone(),
            unlocks: node.unlocks.clone(),
            status: node.status,
            verification_status: node.verification_status,
            evidence: node.evidence.clone(),
            world: world_view(node, mode),
            created_at: node.created_at,
        },
        edges,
        cluster,
        completeness,
        learning_gaps,
        partner_context,
    })
}

fn build_partner_context(graph: &UniverseGraph, node: &Node) -> PartnerContext {
    let verified = |n: &&Node| n.verification_status == VerificationStatus::Verified;

    let mut builds: BTreeMap<NodeId, NodeRef> = BTreeMap::new();
    for edge in graph.edges_of(&node.id) {
        if edge.verification_status != VerificationStatus::Verified {
            continue;
        }
        let other = if edge.source == node.id { &edge.target } else { &edge.source };
        if let Some(project) = graph.node(other).filter(verified) {
            if project.node_type == NodeType::Project && project.status == NodeStatus::Completed {
                builds.insert(project.id.clone(), NodeRef::from(project));
            }
        }
    }

    let connection_path = opportunity::find_root(graph)
        .map(|root| verified_path_labels(graph, &root, &node.id))
        .unwrap_or_default();

    PartnerContext {
        ways_to_help: node.world.ways_to_help.clone(),
        relevant_builds: builds.into_values().collect(),
        connection_path,
    }
}

/// Labels along the shortest verified undirected path, endpoints
/// included. Empty when the endpoints coincide or no verified path
/// exists.
fn verified_path_labels(graph: &UniverseGraph, from: &NodeId, to: &NodeId) -> Vec<String> {
    if from == to {
        return Vec::new();
    }
    let verified_node = |id: &NodeId| {
        graph
            .node(id)
            .filter(|n| n.verification_status == VerificationStatus::Verified)
    };
    if verified_node(from).is_none() {
        return Vec::new();
    }

    let mut previous: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut visited: BTreeSet<NodeId> = BTreeSet::new();
    visited.insert(from.clone());
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(from.clone());

    while let Some(current) = queue.pop_front() {
        for edge in graph.edges_of(&current) {
            if edge.verification_status != VerificationStatus::Verified {
                continue;
            }
            let next = if edge.source == current { &edge.target } else { &edge.source };
            if verified_node(next).is_none() || visited.contains(next) {
                continue;
            }
            visited.insert(next.clone());
            previous.insert(next.clone(), current.clone());
            if next == to {
                let mut labels = Vec::new();
                let mut cursor = to.clone();
                loop {
                    if let Some(node) = graph.node(&cursor) {
                        labels.push(node.label.clone());
                    }
                    match previous.get(&cursor) {
                        Some(parent) => cursor = parent.clone(),
                        None => break,
                    }
                }
                labels.reverse();
                return labels;
            }
            queue.push_back(next.clone());
        }
    }
    Vec::new()
}

/// Enriched cluster list, ordered by level then velocity descending.
#[must_use]
pub fn cluster_views(graph: &UniverseGraph, mode: AccessMode, now: MonthStamp) -> Vec<ClusterView> {
    let metrics = scoring::score_all_clusters(graph, now);
    let mut views: Vec<ClusterView> = graph
        .clusters()
        .filter_map(|c| {
            let m = metrics.get(&c.id)?;
            let node_count = graph
                .cluster_nodes(&c.id)
                .filter(|n| node_visible(n, mode))
                .count();
            Some(ClusterView {
                id: c.id.clone(),
                label: c.label.clone(),
                color: c.color.clone(),
                description: c.description.clone(),
                level: m.level,
                score: m.score,
                velocity: m.velocity,
                velocity_label: m.velocity_label(),
                node_count,
                components: mode.sees_private().then_some(m.components),
                formula: mode.sees_private().then_some(SCORE_FORMULA),
            })
        })
        .collect();
    views.sort_by(|a, b| {
        b.level
            .cmp(&a.level)
            .then_with(|| b.velocity.cmp(&a.velocity))
            .then_with(|| a.id.cmp(&b.id))
    });
    views
}

/// Graph-wide counters over mode-visible entities.
#[must_use]
pub fn universe_stats(graph: &UniverseGraph, mode: AccessMode) -> UniverseStats {
    let counted_nodes: Vec<&Node> = graph.nodes().filter(|n| node_visible(n, mode)).collect();
    let mut nodes_by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    for node in &counted_nodes {
        *nodes_by_type.entry(node.node_type.as_str()).or_insert(0) += 1;
    }

    let counted_edges = graph
        .edges()
        .filter(|e| edge_visible(graph, e, mode))
        .count();

    UniverseStats {
        total_nodes: counted_nodes.len(),
        verified_nodes: graph
            .nodes()
            .filter(|n| n.verification_status == VerificationStatus::Verified)
            .count(),
        total_edges: counted_edges,
        verified_edges: graph
            .edges()
            .filter(|e| e.verification_status == VerificationStatus::Verified)
            .count(),
        total_clusters: graph.clusters().count(),
        nodes_by_type,
        pending_nodes: mode.sees_private().then(|| {
            graph
                .nodes()
                .filter(|n| n.verification_status == VerificationStatus::Pending)
                .count()
        }),
        pending_edges: mode.sees_private().then(|| {
            graph
                .edges()
                .filter(|e| e.verification_status == VerificationStatus::Pending)
                .count()
        }),
    }
}

fn sort_gaps(gaps: &mut [LearningGap]) {
    gaps.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| b.roi_score.cmp(&a.roi_score))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Open gaps joined with cluster label/color, ordered by priority then
/// ROI descending. Private-mode data; the caller gates access.
#[must_use]
pub fn gap_views(graph: &UniverseGraph) -> Vec<GapView> {
    let mut gaps: Vec<LearningGap> = graph
        .gaps()
        .filter(|g| g.status == GapStatus::Open)
        .cloned()
        .collect();
    sort_gaps(&mut gaps);
    gaps.into_iter()
        .map(|gap| {
            let joined = gap.cluster.as_ref().and_then(|cid| graph.cluster(cid));
            GapView {
                cluster_label: joined.map(|c| c.label.clone()),
                cluster_color: joined.map(|c| c.color.clone()),
                gap,
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
