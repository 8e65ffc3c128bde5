//! # Core Type Definitions
//!
//! This module contains all core types for the orrery graph engine:
//! - Entity identifiers (`NodeId`, `EdgeId`, `ClusterId`, `GapId`, `OpportunityId`)
//! - The month-granular clock value (`MonthStamp`)
//! - Domain enums with total mapping functions (`NodeType`, `EdgeType`,
//!   `VerificationStatus`, moderation and detection enums, `AccessMode`)
//! - Entity structs (`Node`, `Edge`, `Cluster`, `LearningGap`, `Opportunity`,
//!   `AuditRecord`)
//! - Error types (`OrreryError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where used as `BTreeMap`/`BTreeSet` keys
//! - Carry no hidden clock: anything time-derived takes the clock value
//!   as an argument

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique, stable identifier for a node in the universe graph.
///
/// Ids are author-assigned slugs (`"circuitheroes"`, `"cap-edge-ai"`), not
/// synthetic integers, so they survive export/import and external references.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

/// Unique identifier for an edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub String);

/// Identifier for a capability cluster.
///
/// Clusters are stored rows with author-defined labels and colors; their
/// ids are data, not a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub String);

/// Identifier for a learning gap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GapId(pub String);

/// Identifier for an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpportunityId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Create a new id from a string.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(NodeId);
string_id!(EdgeId);
string_id!(ClusterId);
string_id!(GapId);
string_id!(OpportunityId);

// =============================================================================
// MONTH STAMP
// =============================================================================

/// A month-granular timestamp (`"YYYY-MM"` on the wire).
///
/// Node activity is tracked by month; recency decay, staleness, and
/// velocity all run on integer month arithmetic against a `MonthStamp`
/// passed in by the caller. The engine never reads a clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthStamp {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u8,
}

impl MonthStamp {
    /// Create a stamp, validating the month range.
    pub fn new(year: i32, month: u8) -> Result<Self, OrreryError> {
        if !(1..=12).contains(&month) {
            return Err(OrreryError::Validation(format!(
                "month out of range: {month}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Parse a `"YYYY-MM"` string.
    pub fn parse(s: &str) -> Result<Self, OrreryError> {
        let bad = || OrreryError::Validation(format!("invalid month stamp: {s:?}"));
        let (year, month) = s.split_once('-').ok_or_else(bad)?;
        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u8 = month.parse().map_err(|_| bad())?;
        Self::new(year, month)
    }

    /// Derive the current month from a wall-clock instant.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        use chrono::Datelike;
        Self {
            year: at.year(),
            month: at.month() as u8,
        }
    }

    /// Whole months elapsed from `self` to `now`, saturating at 0 when
    /// the stamp lies in the future.
    #[must_use]
    pub fn months_since(self, now: Self) -> u32 {
        let elapsed = (i64::from(now.year) - i64::from(self.year)) * 12
            + (i64::from(now.month) - i64::from(self.month));
        if elapsed < 0 { 0 } else { elapsed as u32 }
    }
}

impl fmt::Display for MonthStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthStamp {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MonthStamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthStamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// DOMAIN ENUMS
// =============================================================================

/// Kind of entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Person,
    Project,
    Skill,
    Technology,
    Tool,
    Event,
    Organization,
    Award,
    Endorsement,
    Capability,
    Potential,
    Influence,
    Concept,
    Trip,
    Note,
}

impl NodeType {
    /// Stable lowercase name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Project => "project",
            Self::Skill => "skill",
            Self::Technology => "technology",
            Self::Tool => "tool",
            Self::Event => "event",
            Self::Organization => "organization",
            Self::Award => "award",
            Self::Endorsement => "endorsement",
            Self::Capability => "capability",
            Self::Potential => "potential",
            Self::Influence => "influence",
            Self::Concept => "concept",
            Self::Trip => "trip",
            Self::Note => "note",
        }
    }
}

impl FromStr for NodeType {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(Self::Person),
            "project" => Ok(Self::Project),
            "skill" => Ok(Self::Skill),
            "technology" => Ok(Self::Technology),
            "tool" => Ok(Self::Tool),
            "event" => Ok(Self::Event),
            "organization" => Ok(Self::Organization),
            "award" => Ok(Self::Award),
            "endorsement" => Ok(Self::Endorsement),
            "capability" => Ok(Self::Capability),
            "potential" => Ok(Self::Potential),
            "influence" => Ok(Self::Influence),
            "concept" => Ok(Self::Concept),
            "trip" => Ok(Self::Trip),
            "note" => Ok(Self::Note),
            other => Err(OrreryError::Validation(format!(
                "unknown node type: {other:?}"
            ))),
        }
    }
}

/// Typed relation between two nodes.
///
/// The wire form is SCREAMING_SNAKE (`"BUILT_WITH"`), matching the stored
/// universe data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    BuiltWith,
    LearnedFrom,
    EnabledBy,
    PresentedAt,
    WonAt,
    SupportedBy,
    EndorsedBy,
    EvolvedInto,
    CrossPollinated,
    CapabilityExpansion,
    FuturePath,
    CompoundsInto,
    MentoredBy,
    Uses,
    Unlocks,
}

impl EdgeType {
    /// Stable wire name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuiltWith => "BUILT_WITH",
            Self::LearnedFrom => "LEARNED_FROM",
            Self::EnabledBy => "ENABLED_BY",
            Self::PresentedAt => "PRESENTED_AT",
            Self::WonAt => "WON_AT",
            Self::SupportedBy => "SUPPORTED_BY",
            Self::EndorsedBy => "ENDORSED_BY",
            Self::EvolvedInto => "EVOLVED_INTO",
            Self::CrossPollinated => "CROSS_POLLINATED",
            Self::CapabilityExpansion => "CAPABILITY_EXPANSION",
            Self::FuturePath => "FUTURE_PATH",
            Self::CompoundsInto => "COMPOUNDS_INTO",
            Self::MentoredBy => "MENTORED_BY",
            Self::Uses => "USES",
            Self::Unlocks => "UNLOCKS",
        }
    }

    /// Whether this relation asserts that the source unlocks or compounds
    /// into the target. The missing-connection detector looks for nodes
    /// with none of these going out.
    #[must_use]
    pub const fn is_unlock_family(self) -> bool {
        matches!(
            self,
            Self::Unlocks | Self::CompoundsInto | Self::CapabilityExpansion
        )
    }
}

impl FromStr for EdgeType {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUILT_WITH" => Ok(Self::BuiltWith),
            "LEARNED_FROM" => Ok(Self::LearnedFrom),
            "ENABLED_BY" => Ok(Self::EnabledBy),
            "PRESENTED_AT" => Ok(Self::PresentedAt),
            "WON_AT" => Ok(Self::WonAt),
            "SUPPORTED_BY" => Ok(Self::SupportedBy),
            "ENDORSED_BY" => Ok(Self::EndorsedBy),
            "EVOLVED_INTO" => Ok(Self::EvolvedInto),
            "CROSS_POLLINATED" => Ok(Self::CrossPollinated),
            "CAPABILITY_EXPANSION" => Ok(Self::CapabilityExpansion),
            "FUTURE_PATH" => Ok(Self::FuturePath),
            "COMPOUNDS_INTO" => Ok(Self::CompoundsInto),
            "MENTORED_BY" => Ok(Self::MentoredBy),
            "USES" => Ok(Self::Uses),
            "UNLOCKS" => Ok(Self::Unlocks),
            other => Err(OrreryError::Validation(format!(
                "unknown edge type: {other:?}"
            ))),
        }
    }
}

/// Moderation state of a node or edge.
///
/// `pending -> {verified, rejected, inferred}`; `verified` and `rejected`
/// are terminal; `inferred` may still be approved or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    Inferred,
}

impl VerificationStatus {
    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }

    /// Stable wire name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Inferred => "inferred",
        }
    }
}

/// Lifecycle state of the thing a node describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Completed,
    Active,
    Potential,
}

impl FromStr for NodeStatus {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "active" => Ok(Self::Active),
            "potential" => Ok(Self::Potential),
            other => Err(OrreryError::Validation(format!(
                "unknown node status: {other:?}"
            ))),
        }
    }
}

/// Which entity table a moderation action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    Edge,
}

impl EntityKind {
    /// Stable wire name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
        }
    }
}

impl FromStr for EntityKind {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Self::Node),
            "edge" => Ok(Self::Edge),
            other => Err(OrreryError::Validation(format!(
                "unknown entity kind: {other:?}"
            ))),
        }
    }
}

/// Action submitted against a queued entity.
///
/// `Defer` is a state-preserving acknowledgment: it skips the item in a
/// review pass without mutating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
    Defer,
}

impl ModerationAction {
    /// Stable wire name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Defer => "defer",
        }
    }
}

impl FromStr for ModerationAction {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "defer" => Ok(Self::Defer),
            other => Err(OrreryError::Validation(format!(
                "unknown moderation action: {other:?}"
            ))),
        }
    }
}

/// Access level of a request, resolved once at the boundary and passed
/// into every view call. There is no ambient auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Public,
    Partner,
    Private,
}

impl AccessMode {
    /// Whether a credential resolved to `self` may present as `other`.
    ///
    /// Private covers everything (admin preview); partner covers partner
    /// and public; public covers only itself.
    #[must_use]
    pub const fn covers(self, other: Self) -> bool {
        match self {
            Self::Private => true,
            Self::Partner => matches!(other, Self::Partner | Self::Public),
            Self::Public => matches!(other, Self::Public),
        }
    }

    /// Resolve the effective mode: a requested preview mode is honored
    /// only when the authorized mode covers it.
    #[must_use]
    pub const fn effective(self, requested: Option<Self>) -> Self {
        match requested {
            Some(r) if self.covers(r) => r,
            _ => self,
        }
    }

    /// Private-only material (gaps, breakdowns, formulas) is visible.
    #[must_use]
    pub const fn sees_private(self) -> bool {
        matches!(self, Self::Private)
    }

    /// Unverified entities are visible.
    #[must_use]
    pub const fn sees_unverified(self) -> bool {
        matches!(self, Self::Private)
    }
}

impl FromStr for AccessMode {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "partner" => Ok(Self::Partner),
            "private" => Ok(Self::Private),
            other => Err(OrreryError::Validation(format!(
                "unknown access mode: {other:?}"
            ))),
        }
    }
}

/// Kind of detected learning gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    IncompleteNode,
    WeakCluster,
    MissingConnection,
    StaleProject,
    MissingSkill,
}

impl GapKind {
    /// Stable wire name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncompleteNode => "incomplete_node",
            Self::WeakCluster => "weak_cluster",
            Self::MissingConnection => "missing_connection",
            Self::StaleProject => "stale_project",
            Self::MissingSkill => "missing_skill",
        }
    }
}

/// Open/closed state of a learning gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Open,
    Closed,
}

impl FromStr for GapStatus {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(OrreryError::Validation(format!(
                "unknown gap status: {other:?}"
            ))),
        }
    }
}

/// Pattern family an opportunity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    Path,
    Combination,
    Network,
    Timing,
    Content,
    Gap,
    Product,
    Partnership,
}

impl OpportunityKind {
    /// Stable wire name, total over all variants.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Combination => "combination",
            Self::Network => "network",
            Self::Timing => "timing",
            Self::Content => "content",
            Self::Gap => "gap",
            Self::Product => "product",
            Self::Partnership => "partnership",
        }
    }
}

impl FromStr for OpportunityKind {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(Self::Path),
            "combination" => Ok(Self::Combination),
            "network" => Ok(Self::Network),
            "timing" => Ok(Self::Timing),
            "content" => Ok(Self::Content),
            "gap" => Ok(Self::Gap),
            "product" => Ok(Self::Product),
            "partnership" => Ok(Self::Partnership),
            other => Err(OrreryError::Validation(format!(
                "unknown opportunity kind: {other:?}"
            ))),
        }
    }
}

/// Moderation state of a stored opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Suggested,
    Approved,
    Rejected,
}

/// Where an opportunity was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunitySource {
    Graph,
    Llm,
    Hybrid,
}

/// Rough execution cost of acting on an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

impl FromStr for EffortLevel {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(OrreryError::Validation(format!(
                "unknown effort level: {other:?}"
            ))),
        }
    }
}

// =============================================================================
// ENTITY STRUCTS
// =============================================================================
//
// Entity structs serialize every field. The storage layer encodes them
// with postcard, which is positional: a conditionally-skipped field
// would shift every field after it. Mode-dependent key omission happens
// in the view layer, never here.

/// A single piece of supporting evidence attached to a node or edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// What the evidence is.
    pub description: String,
    /// Where to find it.
    #[serde(default)]
    pub url: Option<String>,
}

impl EvidenceItem {
    /// Create an evidence item without a link.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            url: None,
        }
    }
}

/// The narrative fields of a node's world view.
///
/// Together with the node's own `description`, `evidence`, and `url`,
/// these make up the 8-field completeness checklist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeWorld {
    /// Why this node matters in the bigger picture.
    #[serde(default)]
    pub why_it_matters: Option<String>,
    /// What this node has already unlocked.
    #[serde(default)]
    pub unlocked: Vec<String>,
    /// What this node could enable next.
    #[serde(default)]
    pub enables: Vec<String>,
    /// Known gaps around this node.
    #[serde(default)]
    pub gaps: Vec<String>,
    /// Concrete ways an outside party could help.
    #[serde(default)]
    pub ways_to_help: Vec<String>,
}

/// A node in the universe graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique, stable id.
    pub id: NodeId,
    /// Display label.
    pub label: String,
    /// Entity kind.
    pub node_type: NodeType,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Canonical link.
    #[serde(default)]
    pub url: Option<String>,
    /// Month the underlying activity happened.
    pub timestamp: MonthStamp,
    /// Redundant year, kept for range queries on exported data.
    pub year: i32,
    /// Author-assigned compounding weight, 1-100.
    pub growth_weight: u8,
    /// Author-assessed impact, 0-100.
    pub impact_score: u8,
    /// Capability cluster this node belongs to.
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    /// Ids of nodes this one depends on. Dangling ids are ignored by
    /// scoring, never an error.
    #[serde(default)]
    pub dependencies: BTreeSet<NodeId>,
    /// Ids of nodes this one unlocks.
    #[serde(default)]
    pub unlocks: BTreeSet<NodeId>,
    /// Lifecycle state.
    pub status: NodeStatus,
    /// Moderation state.
    pub verification_status: VerificationStatus,
    /// Supporting evidence.
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    /// Narrative world fields.
    #[serde(default)]
    pub world: NodeWorld,
    /// Insertion instant, RFC 3339.
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Create a node with the standard creation defaults: `active`,
    /// `pending`, growth weight 50, impact 50.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: NodeType,
        timestamp: MonthStamp,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NodeId::new(id),
            label: label.into(),
            node_type,
            description: None,
            url: None,
            timestamp,
            year: timestamp.year,
            growth_weight: 50,
            impact_score: 50,
            cluster: None,
            dependencies: BTreeSet::new(),
            unlocks: BTreeSet::new(),
            status: NodeStatus::Active,
            verification_status: VerificationStatus::Pending,
            evidence: Vec::new(),
            world: NodeWorld::default(),
            created_at,
        }
    }
}

/// A typed, weighted relation between two nodes.
///
/// Confidence is derived, never stored: `confidence::score_edge`
/// recomputes it from current graph state on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique id.
    pub id: EdgeId,
    /// Source node id.
    pub source: NodeId,
    /// Target node id.
    pub target: NodeId,
    /// Relation kind.
    pub edge_type: EdgeType,
    /// Optional display label ("teaches", "runs").
    #[serde(default)]
    pub label: Option<String>,
    /// Author or inferred strength, 1-100.
    pub weight: u8,
    /// Moderation state.
    pub verification_status: VerificationStatus,
    /// Supporting evidence.
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    /// Month the relation was established, when known.
    #[serde(default)]
    pub timestamp: Option<MonthStamp>,
    /// Insertion instant, RFC 3339.
    pub created_at: DateTime<Utc>,
}

impl Edge {
    /// Create an edge with the standard creation defaults: weight 50,
    /// `pending`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EdgeId::new(id),
            source: NodeId::new(source),
            target: NodeId::new(target),
            edge_type,
            label: None,
            weight: 50,
            verification_status: VerificationStatus::Pending,
            evidence: Vec::new(),
            timestamp: None,
            created_at,
        }
    }
}

/// A capability cluster: a domain aggregating related nodes.
///
/// Level, score, and velocity are derived per scoring pass and never
/// stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster id.
    pub id: ClusterId,
    /// Display label.
    pub label: String,
    /// Display color (hex).
    pub color: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Skill nodes considered core to this cluster.
    #[serde(default)]
    pub core_skills: BTreeSet<NodeId>,
}

impl Cluster {
    /// Create a cluster.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: ClusterId::new(id),
            label: label.into(),
            color: color.into(),
            description: None,
            core_skills: BTreeSet::new(),
        }
    }
}

/// A detected (or manually recorded) deficiency in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningGap {
    /// Gap id. Auto-detected gaps derive it from kind + subject, so
    /// re-detection upserts instead of duplicating.
    pub id: GapId,
    /// Gap kind.
    pub kind: GapKind,
    /// Human-readable summary.
    pub label: String,
    /// Urgency, 0-100.
    pub priority_score: u8,
    /// Estimated remediation cost, 0-100.
    pub effort_score: u8,
    /// Derived return on investment, 0-100.
    pub roi_score: u8,
    /// Nodes this gap concerns.
    #[serde(default)]
    pub related_nodes: Vec<NodeId>,
    /// Cluster this gap concerns, if any.
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    /// Open/closed state.
    pub status: GapStatus,
    /// Whether the detector produced this gap.
    pub is_auto_detected: bool,
    /// Insertion instant, RFC 3339.
    pub created_at: DateTime<Utc>,
}

/// A suggested action or connection surfaced from graph structure or the
/// external generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Opportunity id. Graph-pattern ids derive from the constituent
    /// nodes, so regeneration upserts instead of duplicating.
    pub id: OpportunityId,
    /// Pattern family.
    pub kind: OpportunityKind,
    /// Short title.
    pub title: String,
    /// One-line insight.
    pub insight: String,
    /// Step-by-step reasoning shown to the author.
    pub reasoning: Vec<String>,
    /// Node path supporting the opportunity.
    #[serde(default)]
    pub path_nodes: Vec<NodeId>,
    /// Edge path supporting the opportunity.
    #[serde(default)]
    pub path_edges: Vec<EdgeId>,
    /// Labels for the path nodes, resolved at generation time.
    #[serde(default)]
    pub node_labels: Vec<String>,
    /// What the author gains.
    pub value_for_owner: String,
    /// What the counterparty gains.
    pub value_for_them: String,
    /// The shared upside.
    pub mutual_benefit: String,
    /// The single next step.
    pub next_step: String,
    /// Optional longer action plan.
    #[serde(default)]
    pub action_steps: Vec<String>,
    /// Execution cost.
    pub effort: EffortLevel,
    /// Expected timeframe ("immediate", "1-2 months").
    pub timeframe: String,
    /// Confidence, 0-100.
    pub confidence: u8,
    /// Novelty, 0-100.
    pub novelty: u8,
    /// The node this opportunity targets, if one stands out.
    #[serde(default)]
    pub target_node: Option<NodeId>,
    /// Clusters involved.
    #[serde(default)]
    pub related_clusters: Vec<ClusterId>,
    /// Moderation state.
    pub status: OpportunityStatus,
    /// Producer.
    pub source: OpportunitySource,
    /// Insertion instant, RFC 3339.
    pub created_at: DateTime<Utc>,
}

/// What a moderation audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Approve,
    Reject,
    Defer,
    Create,
    Update,
}

impl From<ModerationAction> for AuditAction {
    fn from(action: ModerationAction) -> Self {
        match action {
            ModerationAction::Approve => Self::Approve,
            ModerationAction::Reject => Self::Reject,
            ModerationAction::Defer => Self::Defer,
        }
    }
}

/// One append-only audit log entry.
///
/// Every applied mutation leaves exactly one of these; no-ops leave none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Sequential id assigned by the store.
    pub id: String,
    /// What happened.
    pub action: AuditAction,
    /// Which table it happened to.
    pub entity_kind: String,
    /// Which row it happened to.
    pub entity_id: String,
    /// State before, when applicable.
    #[serde(default)]
    pub previous_value: Option<String>,
    /// State after, when applicable.
    #[serde(default)]
    pub new_value: Option<String>,
    /// Free-text reason supplied by the moderator.
    #[serde(default)]
    pub reason: Option<String>,
    /// Who acted.
    pub created_by: String,
    /// When, RFC 3339.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the orrery engine.
///
/// - No silent failures
/// - Use `Result<T, OrreryError>` for fallible operations
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum OrreryError {
    /// The referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested state transition is not in the transition table.
    ///
    /// Currently unreachable (terminal states are idempotent no-ops);
    /// kept so a future table entry has somewhere to fail to.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Malformed input to a mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external text generator failed, timed out, or returned an
    /// unparseable shape.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The request's mode does not permit the operation.
    #[error("Unauthorized")]
    Unauthorized,

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    #[test]
    fn month_stamp_parse_and_display() {
        let stamp = MonthStamp::parse("2025-08").expect("parse");
        assert_eq!(stamp.year, 2025);
        assert_eq!(stamp.month, 8);
        assert_eq!(stamp.to_string(), "2025-08");
    }

    #[test]
    fn month_stamp_rejects_garbage() {
        assert!(MonthStamp::parse("2025").is_err());
        assert!(MonthStamp::parse("2025-13").is_err());
        assert!(MonthStamp::parse("2025-00").is_err());
        assert!(MonthStamp::parse("abcd-ef").is_err());
    }

    #[test]
    fn month_stamp_months_since() {
        let then = MonthStamp::parse("2024-11").expect("parse");
        let now = MonthStamp::parse("2025-02").expect("parse");
        assert_eq!(then.months_since(now), 3);
        // Future stamps saturate at zero.
        assert_eq!(now.months_since(then), 0);
        assert_eq!(now.months_since(now), 0);
    }

    #[test]
    fn month_stamp_serde_roundtrip() {
        let stamp = MonthStamp::parse("2023-01").expect("parse");
        let json = serde_json::to_string(&stamp).expect("serialize");
        assert_eq!(json, "\"2023-01\"");
        let back: MonthStamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, stamp);
    }

    #[test]
    fn edge_type_wire_names_roundtrip() {
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
            let parsed: EdgeType = edge_type.as_str().parse().expect("parse");
            assert_eq!(parsed, edge_type);
        }
    }

    #[test]
    fn edge_type_serde_matches_as_str() {
        let json = serde_json::to_string(&EdgeType::BuiltWith).expect("serialize");
        assert_eq!(json, "\"BUILT_WITH\"");
    }

    #[test]
    fn terminal_states() {
        assert!(VerificationStatus::Verified.is_terminal());
        assert!(VerificationStatus::Rejected.is_terminal());
        assert!(!VerificationStatus::Pending.is_terminal());
        assert!(!VerificationStatus::Inferred.is_terminal());
    }

    #[test]
    fn access_mode_coverage() {
        assert!(AccessMode::Private.covers(AccessMode::Partner));
        assert!(AccessMode::Private.covers(AccessMode::Public));
        assert!(AccessMode::Partner.covers(AccessMode::Public));
        assert!(!AccessMode::Partner.covers(AccessMode::Private));
        assert!(!AccessMode::Public.covers(AccessMode::Partner));
    }

    #[test]
    fn access_mode_effective_narrows_only() {
        let private = AccessMode::Private;
        assert_eq!(private.effective(Some(AccessMode::Public)), AccessMode::Public);
        let public = AccessMode::Public;
        assert_eq!(public.effective(Some(AccessMode::Private)), AccessMode::Public);
        assert_eq!(public.effective(None), AccessMode::Public);
    }

    #[test]
    fn node_creation_defaults() {
        let stamp = MonthStamp::parse("2025-01").expect("parse");
        let node = Node::new("circuitheroes", "CircuitHeroes", NodeType::Project, stamp, epoch());
        assert_eq!(node.status, NodeStatus::Active);
        assert_eq!(node.verification_status, VerificationStatus::Pending);
        assert_eq!(node.growth_weight, 50);
        assert_eq!(node.impact_score, 50);
        assert_eq!(node.year, 2025);
    }

    #[test]
    fn edge_creation_defaults() {
        let edge = Edge::new("e1", "a", "b", EdgeType::BuiltWith, epoch());
        assert_eq!(edge.weight, 50);
        assert_eq!(edge.verification_status, VerificationStatus::Pending);
    }

    #[test]
    fn unlock_family_membership() {
        assert!(EdgeType::Unlocks.is_unlock_family());
        assert!(EdgeType::CompoundsInto.is_unlock_family());
        assert!(EdgeType::CapabilityExpansion.is_unlock_family());
        assert!(!EdgeType::BuiltWith.is_unlock_family());
    }

    #[test]
    fn node_postcard_roundtrip_with_empty_fields() {
        // Every field is always encoded; partially-filled nodes must
        // survive the positional postcard format.
        let stamp = MonthStamp::parse("2025-01").expect("parse");
        let node = Node::new("x", "X", NodeType::Skill, stamp, epoch());
        let bytes = postcard::to_allocvec(&node).expect("encode");
        let back: Node = postcard::from_bytes(&bytes).expect("decode");
        assert_eq!(back, node);
    }

    #[test]
    fn node_json_accepts_missing_optional_fields() {
        let json = r#"{
            "id": "x", "label": "X", "node_type": "skill",
            "timestamp": "2025-01", "year": 2025,
            "growth_weight": 50, "impact_score": 50,
            "status": "active", "verification_status": "pending",
            "world": {}, "created_at": "1970-01-01T00:00:00Z"
        }"#;
        let node: Node = serde_json::from_str(json).expect("deserialize");
        assert!(node.dependencies.is_empty());
        assert!(node.world.ways_to_help.is_empty());
        assert_eq!(node.description, None);
    }
}
