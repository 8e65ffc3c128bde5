//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Every response carries a `success`
//! flag and an `error` field; payload fields are `None`/empty on failure.
//!
//! Request enums arrive as plain strings and are parsed here (or in the
//! handlers) so a bad value produces the standard error envelope instead
//! of a framework rejection.

use orrery_core::{
    AccessMode, BatchItem, BatchOutcome, ClusterId, ClusterView, Edge, EdgeType, EntityKind,
    EvidenceItem, GapRefreshOutcome, GapView, LearningGap, MonthStamp, Node, NodeDetail, NodeId,
    NodeType, NodeWorld, Opportunity, OpportunityMergeOutcome, OrreryError, OutreachMessage,
    TransitionOutcome, UniverseStats, VerificationQueue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// VIEW RESPONSES
// =============================================================================

/// Node detail response. The detail fields are flattened next to the
/// envelope, so a success reads `{success, node, edges, cluster, ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDetailResponse {
    pub success: bool,
    #[serde(flatten)]
    pub detail: Option<NodeDetail>,
    pub error: Option<String>,
}

impl NodeDetailResponse {
    pub fn success(detail: NodeDetail) -> Self {
        Self {
            success: true,
            detail: Some(detail),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: None,
            error: Some(msg.into()),
        }
    }
}

/// Cluster list response, ordered by level then velocity descending.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterListResponse {
    pub success: bool,
    pub clusters: Vec<ClusterView>,
    pub error: Option<String>,
}

impl ClusterListResponse {
    pub fn success(clusters: Vec<ClusterView>) -> Self {
        Self {
            success: true,
            clusters,
            error: None,
        }
    }
}

/// Universe stats response with the stats fields flattened.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: Option<UniverseStats>,
    pub error: Option<String>,
}

impl StatsResponse {
    pub fn success(stats: UniverseStats) -> Self {
        Self {
            success: true,
            stats: Some(stats),
            error: None,
        }
    }
}

// =============================================================================
// LEARNING GAP REQUEST/RESPONSES
// =============================================================================

/// Learning gap list response. `refresh` reports what the detection
/// pass that preceded the listing did.
#[derive(Debug, Clone, Serialize)]
pub struct GapListResponse {
    pub success: bool,
    pub gaps: Vec<GapView>,
    pub refresh: Option<GapRefreshOutcome>,
    pub error: Option<String>,
}

impl GapListResponse {
    pub fn success(gaps: Vec<GapView>, refresh: GapRefreshOutcome) -> Self {
        Self {
            success: true,
            gaps,
            refresh: Some(refresh),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            gaps: vec![],
            refresh: None,
            error: Some(msg.into()),
        }
    }
}

/// Gap status update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapUpdateRequest {
    /// `"open"` or `"closed"`.
    pub status: String,
}

/// Gap status update response.
#[derive(Debug, Clone, Serialize)]
pub struct GapUpdateResponse {
    pub success: bool,
    pub gap: Option<LearningGap>,
    pub error: Option<String>,
}

impl GapUpdateResponse {
    pub fn success(gap: LearningGap) -> Self {
        Self {
            success: true,
            gap: Some(gap),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            gap: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// OPPORTUNITY REQUEST/RESPONSES
// =============================================================================

/// Opportunity list response, ordered by `confidence * novelty`
/// descending. `counts_by_kind` totals the listed opportunities per
/// kind; `merge` reports what the regeneration pass did.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityListResponse {
    pub success: bool,
    pub opportunities: Vec<Opportunity>,
    pub counts_by_kind: BTreeMap<String, usize>,
    pub merge: Option<OpportunityMergeOutcome>,
    pub error: Option<String>,
}

impl OpportunityListResponse {
    pub fn success(
        opportunities: Vec<Opportunity>,
        counts_by_kind: BTreeMap<String, usize>,
        merge: OpportunityMergeOutcome,
    ) -> Self {
        Self {
            success: true,
            opportunities,
            counts_by_kind,
            merge: Some(merge),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            opportunities: vec![],
            counts_by_kind: BTreeMap::new(),
            merge: None,
            error: Some(msg.into()),
        }
    }
}

/// Opportunity moderation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityModerateRequest {
    /// `"approve"`, `"reject"`, or `"defer"`.
    pub action: String,
}

/// Opportunity moderation response.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityResponse {
    pub success: bool,
    pub opportunity: Option<Opportunity>,
    pub error: Option<String>,
}

impl OpportunityResponse {
    pub fn success(opportunity: Opportunity) -> Self {
        Self {
            success: true,
            opportunity: Some(opportunity),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            opportunity: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// VERIFICATION REQUEST/RESPONSES
// =============================================================================

/// Moderation queue response with the queue fields flattened.
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub success: bool,
    #[serde(flatten)]
    pub queue: Option<VerificationQueue>,
    pub error: Option<String>,
}

impl QueueResponse {
    pub fn success(queue: VerificationQueue) -> Self {
        Self {
            success: true,
            queue: Some(queue),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            queue: None,
            error: Some(msg.into()),
        }
    }
}

/// Single-entity moderation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// `"node"` or `"edge"`.
    pub entity_type: String,
    pub entity_id: String,
    /// `"approve"`, `"reject"`, or `"defer"`.
    pub action: String,
    pub reason: Option<String>,
}

/// Single-entity moderation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub previous: Option<String>,
    pub current: Option<String>,
    pub changed: Option<bool>,
    pub error: Option<String>,
}

impl VerifyResponse {
    pub fn success(outcome: &TransitionOutcome) -> Self {
        Self {
            success: true,
            entity_type: Some(outcome.entity_kind.as_str().to_string()),
            entity_id: Some(outcome.entity_id.clone()),
            previous: Some(outcome.previous.as_str().to_string()),
            current: Some(outcome.current.as_str().to_string()),
            changed: Some(outcome.changed),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            entity_type: None,
            entity_id: None,
            previous: None,
            current: None,
            changed: None,
            error: Some(msg.into()),
        }
    }
}

/// One entry in a batch moderation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// `"node"` or `"edge"`.
    pub entity_type: String,
    pub entity_id: String,
}

impl BatchEntry {
    /// Parse the entity kind, keeping the id as-is.
    pub fn to_item(&self) -> Result<BatchItem, OrreryError> {
        let entity_kind: EntityKind = self.entity_type.parse()?;
        Ok(BatchItem {
            entity_kind,
            entity_id: self.entity_id.clone(),
        })
    }
}

/// Batch moderation request. One action applies to every item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchVerifyRequest {
    pub items: Vec<BatchEntry>,
    /// `"approve"`, `"reject"`, or `"defer"`.
    pub action: String,
    pub reason: Option<String>,
}

/// Batch moderation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchVerifyResponse {
    pub success: bool,
    pub updated: Option<usize>,
    pub skipped: Option<usize>,
    pub error: Option<String>,
}

impl BatchVerifyResponse {
    pub fn success(outcome: BatchOutcome) -> Self {
        Self {
            success: true,
            updated: Some(outcome.updated),
            skipped: Some(outcome.skipped),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            updated: None,
            skipped: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// INSERT REQUEST/RESPONSES
// =============================================================================

/// Node insert/update request. Omitted fields take the standard
/// creation defaults; enum-valued fields arrive as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeUpsertRequest {
    pub id: String,
    pub label: String,
    /// Lowercase node type, e.g. `"project"`.
    pub node_type: String,
    /// Activity month, `"YYYY-MM"`.
    pub timestamp: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub cluster: Option<String>,
    /// `"completed"`, `"active"`, or `"potential"`.
    pub status: Option<String>,
    pub growth_weight: Option<u8>,
    pub impact_score: Option<u8>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub unlocks: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    pub world: Option<NodeWorld>,
}

impl NodeUpsertRequest {
    /// Convert to a node, parsing the string-typed fields.
    ///
    /// Length and presence rules are enforced by the insert itself, so
    /// this only has to fail on unparseable enum values and stamps.
    pub fn into_node(self, created_at: chrono::DateTime<chrono::Utc>) -> Result<Node, OrreryError> {
        let node_type: NodeType = self.node_type.parse()?;
        let timestamp = MonthStamp::parse(&self.timestamp)?;

        let mut node = Node::new(self.id, self.label, node_type, timestamp, created_at);
        node.description = self.description;
        node.url = self.url;
        node.cluster = self.cluster.map(ClusterId::new);
        if let Some(status) = &self.status {
            node.status = status.parse()?;
        }
        if let Some(weight) = self.growth_weight {
            node.growth_weight = weight;
        }
        if let Some(impact) = self.impact_score {
            node.impact_score = impact;
        }
        node.dependencies = self.dependencies.into_iter().map(NodeId::new).collect();
        node.unlocks = self.unlocks.into_iter().map(NodeId::new).collect();
        node.evidence = self.evidence;
        if let Some(world) = self.world {
            node.world = world;
        }
        Ok(node)
    }
}

/// Edge insert/update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeUpsertRequest {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Wire-form edge type, e.g. `"BUILT_WITH"`.
    pub edge_type: String,
    pub label: Option<String>,
    pub weight: Option<u8>,
    /// Relation month, `"YYYY-MM"`.
    pub timestamp: Option<String>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
}

impl EdgeUpsertRequest {
    /// Convert to an edge, parsing the string-typed fields.
    pub fn into_edge(self, created_at: chrono::DateTime<chrono::Utc>) -> Result<Edge, OrreryError> {
        let edge_type: EdgeType = self.edge_type.parse()?;

        let mut edge = Edge::new(self.id, self.source, self.target, edge_type, created_at);
        edge.label = self.label;
        if let Some(weight) = self.weight {
            edge.weight = weight;
        }
        edge.timestamp = match self.timestamp.as_deref() {
            Some(raw) => Some(MonthStamp::parse(raw)?),
            None => None,
        };
        edge.evidence = self.evidence;
        Ok(edge)
    }
}

/// Insert response. `inserted: false` means the entity was dropped
/// without error (dangling or self-loop edge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertResponse {
    pub success: bool,
    pub id: Option<String>,
    pub inserted: Option<bool>,
    pub error: Option<String>,
}

impl InsertResponse {
    pub fn success(id: impl Into<String>, inserted: bool) -> Self {
        Self {
            success: true,
            id: Some(id.into()),
            inserted: Some(inserted),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            inserted: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// OUTREACH REQUEST/RESPONSE
// =============================================================================

/// Outreach draft request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachRequest {
    /// Person node to address.
    pub node_id: String,
    /// Extra situation context for the prompt.
    pub context: Option<String>,
    /// The concrete ask to weave into the draft.
    pub specific_ask: Option<String>,
}

/// Outreach draft response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachResponse {
    pub success: bool,
    pub subject: Option<String>,
    pub draft: Option<String>,
    pub error: Option<String>,
}

impl OutreachResponse {
    pub fn success(message: OutreachMessage) -> Self {
        Self {
            success: true,
            subject: Some(message.subject),
            draft: Some(message.draft),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            subject: None,
            draft: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Canonical export response. `data` is the base64-encoded snapshot,
/// `checksum` the canonical integer checksum, `hash` the BLAKE3 content
/// hash of the canonical body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>,
    pub checksum: Option<u64>,
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], checksum: u64, hash: impl Into<String>) -> Self {
        use base64::Engine;
        Self {
            success: true,
            data: Some(base64::engine::general_purpose::STANDARD.encode(data)),
            checksum: Some(checksum),
            hash: Some(hash.into()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            hash: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// `?mode=` query parameter for read endpoints that support previewing
/// a narrower access mode.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ModeQuery {
    pub mode: Option<AccessMode>,
}
