//! # Universe Facade
//!
//! The high-level engine surface combining the in-memory graph, the
//! optional disk store, and the derived-state modules.
//!
//! All reads and scores run against the in-memory `UniverseGraph`; the
//! store is a durability sidecar. Mutations apply to memory first and
//! then write through, so a storage failure surfaces as an error while
//! memory keeps the newer state until the next successful write of the
//! same rows.
//!
//! The facade owns the clock: every operation that needs "now" stamps
//! it here, so the modules underneath stay pure functions of graph,
//! clock value, and config.

use crate::export;
use crate::gaps::{self, GapConfig, GapRefreshOutcome};
use crate::graph::UniverseGraph;
use crate::opportunity::{self, OpportunityMergeOutcome};
use crate::primitives::{MAX_BATCH_ITEMS, MAX_EVIDENCE_ITEMS, MAX_LABEL_LENGTH, MAX_TEXT_LENGTH};
use crate::scoring;
use crate::storage::RedbStore;
use crate::types::{
    AccessMode, AuditAction, AuditRecord, Cluster, Edge, EdgeId, EntityKind, EvidenceItem, GapId,
    GapStatus, LearningGap, ModerationAction, MonthStamp, Node, NodeId, Opportunity, OpportunityId,
    OpportunitySource, OpportunityStatus, OrreryError,
};
use crate::verification::{self, BatchItem, BatchOutcome, TransitionOutcome, VerificationQueue};
use crate::view::{self, ClusterView, GapView, NodeDetail, UniverseStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Counts reported after a canonical import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub nodes: usize,
    pub edges: usize,
}

/// The assembled universe engine.
#[derive(Debug)]
pub struct Universe {
    /// Current graph state. Always authoritative.
    graph: UniverseGraph,
    /// Durability layer; `None` runs fully in memory.
    store: Option<RedbStore>,
    /// Gap detector thresholds.
    gap_config: GapConfig,
}

impl Universe {
    /// Create an empty in-memory universe.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            graph: UniverseGraph::new(),
            store: None,
            gap_config: GapConfig::default(),
        }
    }

    /// Create an in-memory universe over an existing graph.
    #[must_use]
    pub fn with_graph(graph: UniverseGraph) -> Self {
        Self {
            graph,
            store: None,
            gap_config: GapConfig::default(),
        }
    }

    /// Open a disk-backed universe, loading the stored graph.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OrreryError> {
        let store = RedbStore::open(path)?;
        let graph = store.load()?;
        Ok(Self {
            graph,
            store: Some(store),
            gap_config: GapConfig::default(),
        })
    }

    /// Whether mutations write through to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// The underlying graph.
    #[must_use]
    pub fn graph(&self) -> &UniverseGraph {
        &self.graph
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Insert or replace a node.
    pub fn insert_node(&mut self, node: Node) -> Result<(), OrreryError> {
        validate_node(&node)?;
        let id = node.id.clone();
        self.graph.insert_node(node);
        if let Some(store) = &self.store {
            if let Some(stored) = self.graph.node(&id) {
                store.put_node(stored)?;
            }
        }
        Ok(())
    }

    /// Insert or replace an edge.
    ///
    /// Returns `Ok(false)` without storing anything when an endpoint is
    /// missing or the edge is a self-loop; dangling references are
    /// dropped, never an error.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<bool, OrreryError> {
        validate_edge(&edge)?;
        let id = edge.id.clone();
        let inserted = self.graph.insert_edge(edge);
        if inserted {
            if let Some(store) = &self.store {
                if let Some(stored) = self.graph.edge(&id) {
                    store.put_edge(stored)?;
                }
            }
        }
        Ok(inserted)
    }

    /// Insert or replace a cluster.
    pub fn insert_cluster(&mut self, cluster: Cluster) -> Result<(), OrreryError> {
        validate_cluster(&cluster)?;
        let id = cluster.id.clone();
        self.graph.insert_cluster(cluster);
        if let Some(store) = &self.store {
            if let Some(stored) = self.graph.cluster(&id) {
                store.put_cluster(stored)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // MODERATION
    // =========================================================================

    /// Apply one moderation action, appending an audit record when the
    /// status actually moves. No-ops leave no trace.
    pub fn verify(
        &mut self,
        entity_kind: EntityKind,
        entity_id: &str,
        action: ModerationAction,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<TransitionOutcome, OrreryError> {
        let outcome = verification::apply_action(&mut self.graph, entity_kind, entity_id, action)?;
        if outcome.changed {
            self.graph.push_audit(audit_record(&outcome, action, reason, actor, Utc::now()));
            self.persist_transitions(&[outcome.clone()], 1)?;
        }
        Ok(outcome)
    }

    /// Apply one action to many entities.
    ///
    /// Missing ids and already-terminal items are counted as skipped;
    /// the batch never aborts halfway. All changed rows and their audit
    /// records are persisted in a single transaction.
    pub fn verify_batch(
        &mut self,
        items: &[BatchItem],
        action: ModerationAction,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<BatchOutcome, OrreryError> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(OrreryError::Validation(format!(
                "batch of {} items exceeds the limit of {MAX_BATCH_ITEMS}",
                items.len()
            )));
        }

        let created_at = Utc::now();
        let mut outcome = BatchOutcome::default();
        let mut transitions = Vec::new();

        for item in items {
            match verification::apply_action(
                &mut self.graph,
                item.entity_kind,
                &item.entity_id,
                action,
            ) {
                Ok(transition) if transition.changed => {
                    outcome.updated = outcome.updated.saturating_add(1);
                    self.graph
                        .push_audit(audit_record(&transition, action, reason, actor, created_at));
                    transitions.push(transition);
                }
                Ok(_) | Err(OrreryError::NotFound(_)) => {
                    outcome.skipped = outcome.skipped.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }

        let audit_count = transitions.len();
        self.persist_transitions(&transitions, audit_count)?;
        Ok(outcome)
    }

    /// Write changed rows and their trailing audit records in one
    /// transaction.
    fn persist_transitions(
        &self,
        transitions: &[TransitionOutcome],
        audit_count: usize,
    ) -> Result<(), OrreryError> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for transition in transitions {
            match transition.entity_kind {
                EntityKind::Node => {
                    if let Some(node) = self.graph.node(&NodeId::new(&transition.entity_id)) {
                        nodes.push(node);
                    }
                }
                EntityKind::Edge => {
                    if let Some(edge) = self.graph.edge(&EdgeId::new(&transition.entity_id)) {
                        edges.push(edge);
                    }
                }
            }
        }

        let log = self.graph.audit_log();
        let audits: Vec<&AuditRecord> = log
            .iter()
            .skip(log.len().saturating_sub(audit_count))
            .collect();

        store.persist_moderation(&nodes, &edges, &audits)
    }

    /// The current review queue.
    #[must_use]
    pub fn verification_queue(&self) -> VerificationQueue {
        verification::build_queue(&self.graph)
    }

    /// The audit trail, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> &[AuditRecord] {
        self.graph.audit_log()
    }

    // =========================================================================
    // GAPS
    // =========================================================================

    /// Re-run the gap detectors and reconcile stored gaps.
    pub fn refresh_gaps(&mut self) -> Result<GapRefreshOutcome, OrreryError> {
        let now = Utc::now();
        let outcome = gaps::refresh_gaps(
            &mut self.graph,
            MonthStamp::from_datetime(now),
            &self.gap_config,
            now,
        );
        if let Some(store) = &self.store {
            store.sync_gaps(&self.graph)?;
        }
        Ok(outcome)
    }

    /// Open or close a gap by hand.
    pub fn update_gap_status(
        &mut self,
        id: &GapId,
        status: GapStatus,
    ) -> Result<LearningGap, OrreryError> {
        let gap = self
            .graph
            .gap_mut(id)
            .ok_or_else(|| OrreryError::NotFound(format!("gap {:?}", id.as_str())))?;
        gap.status = status;
        let snapshot = gap.clone();
        if let Some(store) = &self.store {
            store.put_gap(&snapshot)?;
        }
        Ok(snapshot)
    }

    /// Record a manually identified gap.
    pub fn insert_gap(&mut self, gap: LearningGap) -> Result<(), OrreryError> {
        check_required("gap id", gap.id.as_str(), MAX_LABEL_LENGTH)?;
        check_required("gap label", &gap.label, MAX_TEXT_LENGTH)?;
        let id = gap.id.clone();
        self.graph.insert_gap(gap);
        if let Some(store) = &self.store {
            if let Some(stored) = self.graph.gap(&id) {
                store.put_gap(stored)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // OPPORTUNITIES
    // =========================================================================

    /// Regenerate the graph-pattern opportunities and reconcile them
    /// against stored suggestions.
    pub fn regenerate_opportunities(&mut self) -> Result<OpportunityMergeOutcome, OrreryError> {
        let now = Utc::now();
        let candidates = opportunity::generate_graph_opportunities(
            &self.graph,
            MonthStamp::from_datetime(now),
            now,
        );
        let outcome =
            opportunity::merge_opportunities(&mut self.graph, candidates, OpportunitySource::Graph);
        if let Some(store) = &self.store {
            store.sync_opportunities(&self.graph)?;
        }
        Ok(outcome)
    }

    /// The generation prompt for the external text generator.
    #[must_use]
    pub fn opportunity_prompt(&self) -> String {
        let now = MonthStamp::from_datetime(Utc::now());
        let metrics = scoring::score_all_clusters(&self.graph, now);
        opportunity::build_opportunity_prompt(&self.graph, &metrics)
    }

    /// Parse a generator response and merge the drafted opportunities.
    ///
    /// A malformed response fails the whole call; nothing is stored.
    pub fn ingest_opportunity_drafts(
        &mut self,
        raw: &str,
    ) -> Result<OpportunityMergeOutcome, OrreryError> {
        let drafts = opportunity::parse_opportunity_drafts(raw, Utc::now())?;
        let outcome =
            opportunity::merge_opportunities(&mut self.graph, drafts, OpportunitySource::Llm);
        if let Some(store) = &self.store {
            store.sync_opportunities(&self.graph)?;
        }
        Ok(outcome)
    }

    /// Approve or reject a suggestion. Settled suggestions are
    /// idempotent no-ops, like moderation on nodes and edges.
    pub fn moderate_opportunity(
        &mut self,
        id: &OpportunityId,
        action: ModerationAction,
    ) -> Result<Opportunity, OrreryError> {
        let opp = self
            .graph
            .opportunity_mut(id)
            .ok_or_else(|| OrreryError::NotFound(format!("opportunity {:?}", id.as_str())))?;
        if opp.status == OpportunityStatus::Suggested {
            match action {
                ModerationAction::Approve => opp.status = OpportunityStatus::Approved,
                ModerationAction::Reject => opp.status = OpportunityStatus::Rejected,
                ModerationAction::Defer => {}
            }
        }
        let snapshot = opp.clone();
        if let Some(store) = &self.store {
            store.put_opportunity(&snapshot)?;
        }
        Ok(snapshot)
    }

    /// All stored opportunities, id order.
    pub fn opportunities(&self) -> impl Iterator<Item = &Opportunity> {
        self.graph.opportunities()
    }

    /// The outreach prompt for a node the author wants to contact.
    pub fn outreach_prompt(
        &self,
        node_id: &NodeId,
        context: Option<&str>,
        specific_ask: Option<&str>,
    ) -> Result<String, OrreryError> {
        let node = self
            .graph
            .node(node_id)
            .ok_or_else(|| OrreryError::NotFound(format!("node {:?}", node_id.as_str())))?;
        Ok(opportunity::build_outreach_prompt(
            &self.graph,
            node,
            context,
            specific_ask,
        ))
    }

    // =========================================================================
    // VIEWS
    // =========================================================================

    /// Mode-filtered node detail.
    pub fn node_detail(&self, id: &NodeId, mode: AccessMode) -> Result<NodeDetail, OrreryError> {
        view::node_detail(&self.graph, id, mode)
    }

    /// Mode-filtered cluster summaries, strongest first.
    #[must_use]
    pub fn cluster_views(&self, mode: AccessMode) -> Vec<ClusterView> {
        view::cluster_views(
            &self.graph,
            mode,
            MonthStamp::from_datetime(Utc::now()),
        )
    }

    /// Mode-filtered totals.
    #[must_use]
    pub fn stats(&self, mode: AccessMode) -> UniverseStats {
        view::universe_stats(&self.graph, mode)
    }

    /// Open gaps joined with their clusters, highest priority first.
    #[must_use]
    pub fn gap_views(&self) -> Vec<GapView> {
        view::gap_views(&self.graph)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Canonical deterministic export of the full graph.
    pub fn export_canonical(&self) -> Result<Vec<u8>, OrreryError> {
        export::export_canonical(&self.graph)
    }

    /// Replace the whole universe from a canonical export.
    ///
    /// The new graph is written to disk before memory is swapped, so a
    /// failed import leaves the running state untouched.
    pub fn import_canonical(&mut self, data: &[u8]) -> Result<ImportOutcome, OrreryError> {
        let graph = export::import_canonical(data)?;
        let outcome = ImportOutcome {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        };
        if let Some(store) = &self.store {
            store.save(&graph)?;
        }
        self.graph = graph;
        Ok(outcome)
    }

    /// Write the full current graph to disk. No-op in memory mode.
    pub fn persist(&self) -> Result<(), OrreryError> {
        if let Some(store) = &self.store {
            store.save(&self.graph)?;
        }
        Ok(())
    }

    /// Compact the backing database file. No-op in memory mode.
    pub fn compact(&mut self) -> Result<(), OrreryError> {
        if let Some(store) = &mut self.store {
            store.compact()?;
        }
        Ok(())
    }
}

fn audit_record(
    outcome: &TransitionOutcome,
    action: ModerationAction,
    reason: Option<&str>,
    actor: &str,
    created_at: DateTime<Utc>,
) -> AuditRecord {
    AuditRecord {
        id: String::new(),
        action: AuditAction::from(action),
        entity_kind: outcome.entity_kind.as_str().to_string(),
        entity_id: outcome.entity_id.clone(),
        previous_value: Some(outcome.previous.as_str().to_string()),
        new_value: Some(outcome.current.as_str().to_string()),
        reason: reason.map(str::to_string),
        created_by: actor.to_string(),
        created_at,
    }
}

// =============================================================================
// INPUT VALIDATION
// =============================================================================

fn check_required(field: &str, value: &str, max: usize) -> Result<(), OrreryError> {
    if value.trim().is_empty() {
        return Err(OrreryError::Validation(format!("{field} must not be empty")));
    }
    check_len(field, value, max)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), OrreryError> {
    if value.len() > max {
        return Err(OrreryError::Validation(format!(
            "{field} exceeds {max} bytes"
        )));
    }
    Ok(())
}

fn check_evidence(field: &str, evidence: &[EvidenceItem]) -> Result<(), OrreryError> {
    if evidence.len() > MAX_EVIDENCE_ITEMS {
        return Err(OrreryError::Validation(format!(
            "{field} carries {} evidence items, limit is {MAX_EVIDENCE_ITEMS}",
            evidence.len()
        )));
    }
    for item in evidence {
        check_required("evidence description", &item.description, MAX_TEXT_LENGTH)?;
        if let Some(url) = &item.url {
            check_len("evidence url", url, MAX_TEXT_LENGTH)?;
        }
    }
    Ok(())
}

fn validate_node(node: &Node) -> Result<(), OrreryError> {
    check_required("node id", node.id.as_str(), MAX_LABEL_LENGTH)?;
    check_required("node label", &node.label, MAX_LABEL_LENGTH)?;
    if let Some(description) = &node.description {
        check_len("node description", description, MAX_TEXT_LENGTH)?;
    }
    if let Some(url) = &node.url {
        check_len("node url", url, MAX_TEXT_LENGTH)?;
    }
    if let Some(why) = &node.world.why_it_matters {
        check_len("why_it_matters", why, MAX_TEXT_LENGTH)?;
    }
    for (field, items) in [
        ("unlocked", &node.world.unlocked),
        ("enables", &node.world.enables),
        ("gaps", &node.world.gaps),
        ("ways_to_help", &node.world.ways_to_help),
    ] {
        for item in items {
            check_len(field, item, MAX_TEXT_LENGTH)?;
        }
    }
    check_evidence("node", &node.evidence)
}

fn validate_edge(edge: &Edge) -> Result<(), OrreryError> {
    check_required("edge id", edge.id.as_str(), MAX_LABEL_LENGTH)?;
    check_required("edge source", edge.source.as_str(), MAX_LABEL_LENGTH)?;
    check_required("edge target", edge.target.as_str(), MAX_LABEL_LENGTH)?;
    if let Some(label) = &edge.label {
        check_len("edge label", label, MAX_LABEL_LENGTH)?;
    }
    check_evidence("edge", &edge.evidence)
}

fn validate_cluster(cluster: &Cluster) -> Result<(), OrreryError> {
    check_required("cluster id", cluster.id.as_str(), MAX_LABEL_LENGTH)?;
    check_required("cluster label", &cluster.label, MAX_LABEL_LENGTH)?;
    check_required("cluster color", &cluster.color, MAX_LABEL_LENGTH)?;
    if let Some(description) = &cluster.description {
        check_len("cluster description", description, MAX_TEXT_LENGTH)?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
