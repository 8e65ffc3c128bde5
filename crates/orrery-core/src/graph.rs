//! # Universe Graph
//!
//! The deterministic in-memory store for the orrery engine.
//!
//! Holds the five entity tables (nodes, edges, clusters, gaps,
//! opportunities) plus the append-only audit log, with edge adjacency
//! indexes for traversal. All data structures use `BTreeMap`/`BTreeSet`
//! for deterministic ordering.

use crate::types::{
    AuditRecord, Cluster, ClusterId, Edge, EdgeId, GapId, LearningGap, Node, NodeId, Opportunity,
    OpportunityId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The full universe graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
/// No `HashMap` allowed.
#[derive(Debug, Clone, Default)]
pub struct UniverseGraph {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Edge storage: EdgeId -> Edge
    edges: BTreeMap<EdgeId, Edge>,

    /// Cluster storage: ClusterId -> Cluster
    clusters: BTreeMap<ClusterId, Cluster>,

    /// Gap storage: GapId -> LearningGap
    gaps: BTreeMap<GapId, LearningGap>,

    /// Opportunity storage: OpportunityId -> Opportunity
    opportunities: BTreeMap<OpportunityId, Opportunity>,

    /// Append-only moderation trail.
    audit_log: Vec<AuditRecord>,

    /// Adjacency index: source node -> outgoing edge ids
    outgoing: BTreeMap<NodeId, BTreeSet<EdgeId>>,

    /// Adjacency index: target node -> incoming edge ids
    incoming: BTreeMap<NodeId, BTreeSet<EdgeId>>,
}

impl UniverseGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node. Edges referencing the node are untouched.
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert or replace an edge.
    ///
    /// Returns `false` and stores nothing when either endpoint is missing
    /// or the edge is a self-loop; dangling references are ignored, never
    /// an error. Replacing an edge whose endpoints changed updates the
    /// adjacency indexes.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        if edge.source == edge.target {
            return false;
        }
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            return false;
        }

        if let Some(previous) = self.edges.get(&edge.id) {
            let stale_source = previous.source.clone();
            let stale_target = previous.target.clone();
            if let Some(set) = self.outgoing.get_mut(&stale_source) {
                set.remove(&edge.id);
            }
            if let Some(set) = self.incoming.get_mut(&stale_target) {
                set.remove(&edge.id);
            }
        }

        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.id.clone());
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.id.clone());
        self.edges.insert(edge.id.clone(), edge);
        true
    }

    /// Insert or replace a cluster.
    pub fn insert_cluster(&mut self, cluster: Cluster) {
        self.clusters.insert(cluster.id.clone(), cluster);
    }

    /// Insert or replace a gap.
    pub fn insert_gap(&mut self, gap: LearningGap) {
        self.gaps.insert(gap.id.clone(), gap);
    }

    /// Remove a gap, returning it if present.
    pub fn remove_gap(&mut self, id: &GapId) -> Option<LearningGap> {
        self.gaps.remove(id)
    }

    /// Insert or replace an opportunity.
    pub fn insert_opportunity(&mut self, opportunity: Opportunity) {
        self.opportunities.insert(opportunity.id.clone(), opportunity);
    }

    /// Remove an opportunity, returning it if present.
    pub fn remove_opportunity(&mut self, id: &OpportunityId) -> Option<Opportunity> {
        self.opportunities.remove(id)
    }

    /// Append an audit record, assigning the next sequential id. Any id
    /// already on the record is replaced.
    pub fn push_audit(&mut self, mut record: AuditRecord) {
        record.id = format!("audit-{:06}", self.audit_log.len().saturating_add(1));
        self.audit_log.push(record);
    }

    /// Lookup a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable lookup of a node by id.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Lookup an edge by id.
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Mutable lookup of an edge by id.
    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    /// Lookup a cluster by id.
    #[must_use]
    pub fn cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    /// Lookup a gap by id.
    #[must_use]
    pub fn gap(&self, id: &GapId) -> Option<&LearningGap> {
        self.gaps.get(id)
    }

    /// Mutable lookup of a gap by id.
    pub fn gap_mut(&mut self, id: &GapId) -> Option<&mut LearningGap> {
        self.gaps.get_mut(id)
    }

    /// Lookup an opportunity by id.
    #[must_use]
    pub fn opportunity(&self, id: &OpportunityId) -> Option<&Opportunity> {
        self.opportunities.get(id)
    }

    /// Mutable lookup of an opportunity by id.
    pub fn opportunity_mut(&mut self, id: &OpportunityId) -> Option<&mut Opportunity> {
        self.opportunities.get_mut(id)
    }

    /// All nodes in deterministic (id) order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges in deterministic (id) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// All clusters in deterministic (id) order.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// All gaps in deterministic (id) order.
    pub fn gaps(&self) -> impl Iterator<Item = &LearningGap> {
        self.gaps.values()
    }

    /// All opportunities in deterministic (id) order.
    pub fn opportunities(&self) -> impl Iterator<Item = &Opportunity> {
        self.opportunities.values()
    }

    /// The audit trail, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> &[AuditRecord] {
        &self.audit_log
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether a node exists.
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Outgoing edges of a node, in deterministic (edge id) order.
    pub fn edges_from(&self, node: &NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(node)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.edges.get(id))
    }

    /// Incoming edges of a node, in deterministic (edge id) order.
    pub fn edges_to(&self, node: &NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(node)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.edges.get(id))
    }

    /// Edges touching a node in either direction.
    pub fn edges_of(&self, node: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges_from(node).chain(self.edges_to(node))
    }

    /// Distinct nodes reachable over one edge in either direction.
    #[must_use]
    pub fn neighbors_undirected(&self, node: &NodeId) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for edge in self.edges_from(node) {
            out.insert(edge.target.clone());
        }
        for edge in self.edges_to(node) {
            out.insert(edge.source.clone());
        }
        out.remove(node);
        out
    }

    /// Whether any edge connects `a` and `b`, in either direction.
    #[must_use]
    pub fn has_edge_between(&self, a: &NodeId, b: &NodeId) -> bool {
        self.edges_from(a).any(|e| &e.target == b) || self.edges_from(b).any(|e| &e.target == a)
    }

    /// Nodes assigned to a cluster, in deterministic (id) order.
    pub fn cluster_nodes<'a>(&'a self, id: &'a ClusterId) -> impl Iterator<Item = &'a Node> {
        self.nodes
            .values()
            .filter(move |n| n.cluster.as_ref() == Some(id))
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the graph for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableUniverse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub gaps: Vec<LearningGap>,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub audit_log: Vec<AuditRecord>,
}

impl From<&UniverseGraph> for SerializableUniverse {
    fn from(graph: &UniverseGraph) -> Self {
        Self {
            nodes: graph.nodes.values().cloned().collect(),
            edges: graph.edges.values().cloned().collect(),
            clusters: graph.clusters.values().cloned().collect(),
            gaps: graph.gaps.values().cloned().collect(),
            opportunities: graph.opportunities.values().cloned().collect(),
            audit_log: graph.audit_log.clone(),
        }
    }
}

impl From<SerializableUniverse> for UniverseGraph {
    fn from(su: SerializableUniverse) -> Self {
        let mut graph = UniverseGraph::new();
        for node in su.nodes {
            graph.insert_node(node);
        }
        for edge in su.edges {
            // Dangling edges in stored data are dropped, same as live inserts.
            let _ = graph.insert_edge(edge);
        }
        for cluster in su.clusters {
            graph.insert_cluster(cluster);
        }
        for gap in su.gaps {
            graph.insert_gap(gap);
        }
        for opportunity in su.opportunities {
            graph.insert_opportunity(opportunity);
        }
        graph.audit_log = su.audit_log;
        graph
    }
}

// =============================================================================
// TESTS
// =============================================================================
