//! # Opportunity Engine
//!
//! Two producers of opportunities:
//!
//! - Five deterministic graph-pattern generators (path, network,
//!   combination, content, level-up). Ids derive from the constituent
//!   entity ids, so regeneration upserts instead of duplicating.
//! - An external text generator: this module builds the prompt and
//!   parses/validates the response, but never performs I/O itself.
//!   Malformed responses are discarded whole, never stored partially.
//!
//! Candidates are ranked by `confidence * novelty` descending.

use crate::graph::UniverseGraph;
use crate::primitives::MAX_PATH_HOPS;
use crate::scoring::{self, ClusterMetrics};
use crate::types::{
    ClusterId, Edge, EdgeId, EffortLevel, MonthStamp, Node, NodeId, NodeStatus, NodeType,
    Opportunity, OpportunityId, OpportunityKind, OpportunitySource, OpportunityStatus,
    OrreryError, VerificationStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::str::FromStr;

/// Most path opportunities kept per generation pass.
pub const PATH_OPPORTUNITY_LIMIT: usize = 10;

/// Most warm-introduction opportunities kept per generation pass.
pub const NETWORK_OPPORTUNITY_LIMIT: usize = 5;

/// Impact above which any node qualifies as a path endpoint.
pub const PATH_IMPACT_THRESHOLD: u8 = 70;

/// Impact above which a person qualifies as an introduction target.
pub const NETWORK_IMPACT_THRESHOLD: u8 = 60;

/// Cluster level from which the combination generator considers a
/// cluster strong.
pub const COMBINATION_MIN_LEVEL: u8 = 3;

/// Velocity (hundredths) above which a low-level cluster is worth
/// leveling up.
pub const LEVEL_UP_VELOCITY_FLOOR: u32 = 30;

/// What a merge pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpportunityMergeOutcome {
    /// Candidates offered to the store.
    pub generated: usize,
    /// New opportunities stored.
    pub inserted: usize,
    /// Existing suggestions re-scored in place.
    pub updated: usize,
    /// Candidates suppressed because the author already moderated that id.
    pub skipped_moderated: usize,
    /// Stale graph-sourced suggestions removed.
    pub removed: usize,
}

/// A fully parsed outreach message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachMessage {
    pub subject: String,
    pub draft: String,
}

// =============================================================================
// ROOT RESOLUTION
// =============================================================================

/// Pick the root node: the non-rejected person with the most touching
/// edges, ties broken by smallest id.
///
/// The root anchors path, network, and content generation. A graph
/// without any person node has no root; root-relative generators then
/// produce nothing.
#[must_use]
pub fn find_root(graph: &UniverseGraph) -> Option<NodeId> {
    graph
        .nodes()
        .filter(|n| {
            n.node_type == NodeType::Person
                && n.verification_status != VerificationStatus::Rejected
        })
        .map(|n| (graph.edges_of(&n.id).count(), n.id.clone()))
        .max_by(|(da, ida), (db, idb)| da.cmp(db).then_with(|| idb.cmp(ida)))
        .map(|(_, id)| id)
}

// =============================================================================
// GRAPH-PATTERN GENERATORS
// =============================================================================

/// Run all five graph-pattern generators and rank the result.
///
/// Pure: reads the non-rejected graph plus the clock, writes nothing.
#[must_use]
pub fn generate_graph_opportunities(
    graph: &UniverseGraph,
    now: MonthStamp,
    created_at: DateTime<Utc>,
) -> Vec<Opportunity> {
    let root = find_root(graph);
    let metrics = scoring::score_all_clusters(graph, now);

    let mut candidates = Vec::new();
    if let Some(root) = &root {
        candidates.extend(path_opportunities(graph, root, created_at));
        candidates.extend(network_opportunities(graph, root, created_at));
    }
    candidates.extend(combination_opportunities(graph, &metrics, created_at));
    candidates.extend(content_opportunities(graph, created_at));
    candidates.extend(level_up_opportunities(graph, &metrics, created_at));

    rank(&mut candidates);
    candidates
}

/// Rank in place: `confidence * novelty` descending, ties by id.
fn rank(candidates: &mut [Opportunity]) {
    candidates.sort_by(|a, b| {
        let ra = u32::from(a.confidence) * u32::from(a.novelty);
        let rb = u32::from(b.confidence) * u32::from(b.novelty);
        rb.cmp(&ra).then_with(|| a.id.cmp(&b.id))
    });
}

fn alive(node: &Node) -> bool {
    node.verification_status != VerificationStatus::Rejected
}

/// Non-rejected edges of a node paired with the far endpoint, skipping
/// rejected far nodes. Deterministic: outgoing then incoming, each in
/// edge-id order.
fn connections<'a>(graph: &'a UniverseGraph, id: &NodeId) -> Vec<(&'a Node, &'a Edge)> {
    graph
        .edges_of(id)
        .filter(|e| e.verification_status != VerificationStatus::Rejected)
        .filter_map(|e| {
            let other = if &e.source == id { &e.target } else { &e.source };
            graph.node(other).filter(|n| alive(n)).map(|n| (n, e))
        })
        .collect()
}

fn qualifies_as_path_end(node: &Node) -> bool {
    matches!(node.node_type, NodeType::Organization | NodeType::Event)
        || node.impact_score > PATH_IMPACT_THRESHOLD
}

/// Shortest connection paths from the root, breadth-first up to
/// `MAX_PATH_HOPS`, ending at organizations, events, or high-impact
/// nodes.
fn path_opportunities(
    graph: &UniverseGraph,
    root: &NodeId,
    created_at: DateTime<Utc>,
) -> Vec<Opportunity> {
    let Some(root_node) = graph.node(root).filter(|n| alive(n)) else {
        return Vec::new();
    };

    let mut visited: BTreeSet<NodeId> = BTreeSet::new();
    visited.insert(root.clone());
    let mut queue: VecDeque<Vec<(NodeId, Option<EdgeId>)>> = VecDeque::new();
    queue.push_back(vec![(root.clone(), None)]);

    let mut found = Vec::new();
    while let Some(path) = queue.pop_front() {
        let hops = path.len() - 1;
        if hops >= MAX_PATH_HOPS {
            continue;
        }
        let Some((current, _)) = path.last() else {
            continue;
        };
        for (next, edge) in connections(graph, current) {
            if visited.contains(&next.id) {
                continue;
            }
            visited.insert(next.id.clone());
            let mut extended = path.clone();
            extended.push((next.id.clone(), Some(edge.id.clone())));
            if qualifies_as_path_end(next) {
                found.push(build_path_opportunity(graph, root_node, next, &extended, created_at));
            }
            queue.push_back(extended);
        }
    }

    rank(&mut found);
    found.truncate(PATH_OPPORTUNITY_LIMIT);
    found
}

fn build_path_opportunity(
    graph: &UniverseGraph,
    root: &Node,
    end: &Node,
    path: &[(NodeId, Option<EdgeId>)],
    created_at: DateTime<Utc>,
) -> Opportunity {
    let hops = (path.len() - 1) as u32;
    let base = 100u32.saturating_sub(hops * 20);
    let confidence = (base * u32::from(end.impact_score) / 100).min(100) as u8;
    let novelty = 100u32.saturating_sub(hops * 25).max(20) as u8;

    let path_nodes: Vec<NodeId> = path.iter().map(|(id, _)| id.clone()).collect();
    let path_edges: Vec<EdgeId> = path.iter().filter_map(|(_, e)| e.clone()).collect();
    let node_labels: Vec<String> = path_nodes
        .iter()
        .filter_map(|id| graph.node(id).map(|n| n.label.clone()))
        .collect();

    let mut reasoning = Vec::new();
    for pair in path.windows(2) {
        let from_label = graph
            .node(&pair[0].0)
            .map_or_else(String::new, |n| n.label.clone());
        let to_label = graph
            .node(&pair[1].0)
            .map_or_else(String::new, |n| n.label.clone());
        if let Some(edge_id) = &pair[1].1 {
            if let Some(edge) = graph.edge(edge_id) {
                reasoning.push(format!("{from_label} {} {to_label}", edge.edge_type.as_str()));
            }
        }
    }

    let next_step = match node_labels.get(1) {
        Some(via) if hops > 1 => {
            format!("Reach out to {} referencing {via}", end.label)
        }
        _ => format!("Reach out to {} directly", end.label),
    };

    let mut related_clusters = Vec::new();
    for cluster in [root.cluster.clone(), end.cluster.clone()].into_iter().flatten() {
        if !related_clusters.contains(&cluster) {
            related_clusters.push(cluster);
        }
    }

    Opportunity {
        id: OpportunityId::new(format!("opp-path-{}", end.id)),
        kind: OpportunityKind::Path,
        title: format!("Path to {}", end.label),
        insight: format!("{} connects to {} in {hops} steps", root.label, end.label),
        reasoning,
        path_nodes,
        path_edges,
        node_labels,
        value_for_owner: format!(
            "A direct line to {} through work you can already show",
            end.label
        ),
        value_for_them: format!("Context on {}'s proven work before the first call", root.label),
        mutual_benefit: "A warm, evidence-backed introduction instead of a cold one".to_string(),
        next_step,
        action_steps: vec![
            "Review the connecting work".to_string(),
            format!("Draft a short note to {}", end.label),
        ],
        effort: if hops <= 2 { EffortLevel::Low } else { EffortLevel::Medium },
        timeframe: match hops {
            0 | 1 => "immediate".to_string(),
            2 => "1-2 months".to_string(),
            _ => "3-6 months".to_string(),
        },
        confidence,
        novelty,
        target_node: Some(end.id.clone()),
        related_clusters,
        status: OpportunityStatus::Suggested,
        source: OpportunitySource::Graph,
        created_at,
    }
}

fn qualifies_as_intro_target(node: &Node) -> bool {
    match node.node_type {
        NodeType::Organization | NodeType::Event => true,
        NodeType::Person => node.impact_score > NETWORK_IMPACT_THRESHOLD,
        _ => false,
    }
}

/// Warm introductions: root knows M (a person), M connects to T, and no
/// direct root-T edge exists.
fn network_opportunities(
    graph: &UniverseGraph,
    root: &NodeId,
    created_at: DateTime<Utc>,
) -> Vec<Opportunity> {
    let Some(root_node) = graph.node(root).filter(|n| alive(n)) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut seen: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
    for (via, via_edge) in connections(graph, root) {
        if via.node_type != NodeType::Person || via.id == *root {
            continue;
        }
        for (target, target_edge) in connections(graph, &via.id) {
            if target.id == *root || target.id == via.id {
                continue;
            }
            if !qualifies_as_intro_target(target) {
                continue;
            }
            if graph.has_edge_between(root, &target.id) {
                continue;
            }
            if !seen.insert((via.id.clone(), target.id.clone())) {
                continue;
            }

            let confidence = ((u32::from(via.impact_score) + u32::from(target.impact_score)) / 2)
                .min(90) as u8;
            found.push(Opportunity {
                id: OpportunityId::new(format!("opp-network-{}-{}", via.id, target.id)),
                kind: OpportunityKind::Network,
                title: format!("Warm intro to {} via {}", target.label, via.label),
                insight: format!("{} already knows {}", via.label, target.label),
                reasoning: vec![
                    format!("{} knows {}", root_node.label, via.label),
                    format!("{} connects to {}", via.label, target.label),
                    format!("No direct link to {} exists yet", target.label),
                ],
                path_nodes: vec![root.clone(), via.id.clone(), target.id.clone()],
                path_edges: vec![via_edge.id.clone(), target_edge.id.clone()],
                node_labels: vec![
                    root_node.label.clone(),
                    via.label.clone(),
                    target.label.clone(),
                ],
                value_for_owner: "An introduction grounded in an existing relationship"
                    .to_string(),
                value_for_them: format!("{} can vouch for the work directly", via.label),
                mutual_benefit: "Lower-friction first contact for both sides".to_string(),
                next_step: format!("Ask {} for an introduction to {}", via.label, target.label),
                action_steps: Vec::new(),
                effort: EffortLevel::Low,
                timeframe: "immediate".to_string(),
                confidence,
                novelty: 60,
                target_node: Some(target.id.clone()),
                related_clusters: Vec::new(),
                status: OpportunityStatus::Suggested,
                source: OpportunitySource::Graph,
                created_at,
            });
        }
    }

    rank(&mut found);
    found.truncate(NETWORK_OPPORTUNITY_LIMIT);
    found
}

/// Count non-rejected edges joining two clusters, in either direction.
fn cross_cluster_edges(graph: &UniverseGraph, a: &ClusterId, b: &ClusterId) -> usize {
    graph
        .edges()
        .filter(|e| e.verification_status != VerificationStatus::Rejected)
        .filter(|e| {
            let source = graph.node(&e.source).and_then(|n| n.cluster.as_ref());
            let target = graph.node(&e.target).and_then(|n| n.cluster.as_ref());
            matches!((source, target), (Some(s), Some(t))
                if (s == a && t == b) || (s == b && t == a))
        })
        .count()
}

/// Under-leveraged capability pairs: strong clusters with almost no
/// bridges between them.
fn combination_opportunities(
    graph: &UniverseGraph,
    metrics: &BTreeMap<ClusterId, ClusterMetrics>,
    created_at: DateTime<Utc>,
) -> Vec<Opportunity> {
    let strong: Vec<(&ClusterId, &ClusterMetrics)> = metrics
        .iter()
        .filter(|(_, m)| m.level >= COMBINATION_MIN_LEVEL)
        .collect();

    let mut found = Vec::new();
    for (i, &(id_a, m_a)) in strong.iter().enumerate() {
        for &(id_b, m_b) in strong.iter().skip(i + 1) {
            let bridges = cross_cluster_edges(graph, id_a, id_b);
            if bridges >= 2 {
                continue;
            }
            let label_a = graph.cluster(id_a).map_or_else(|| id_a.to_string(), |c| c.label.clone());
            let label_b = graph.cluster(id_b).map_or_else(|| id_b.to_string(), |c| c.label.clone());
            let confidence = 50 + 10 * m_a.level.min(m_b.level);
            found.push(Opportunity {
                id: OpportunityId::new(format!("opp-combination-{id_a}-{id_b}")),
                kind: OpportunityKind::Combination,
                title: format!("Combine {label_a} with {label_b}"),
                insight: "Two strong capabilities with almost no bridges between them"
                    .to_string(),
                reasoning: vec![
                    format!("{label_a} is at level {}", m_a.level),
                    format!("{label_b} is at level {}", m_b.level),
                    format!("Only {bridges} cross-cluster edges join them"),
                ],
                path_nodes: Vec::new(),
                path_edges: Vec::new(),
                node_labels: Vec::new(),
                value_for_owner: "A niche very few people can occupy".to_string(),
                value_for_them: "Cross-domain work is rare and memorable".to_string(),
                mutual_benefit: "Each new project strengthens both clusters at once".to_string(),
                next_step: format!("Sketch one project that needs both {label_a} and {label_b}"),
                action_steps: Vec::new(),
                effort: EffortLevel::Medium,
                timeframe: "3-6 months".to_string(),
                confidence,
                novelty: 85,
                target_node: None,
                related_clusters: vec![id_a.clone(), id_b.clone()],
                status: OpportunityStatus::Suggested,
                source: OpportunitySource::Graph,
                created_at,
            });
        }
    }
    found
}

/// Narrative angles from accumulated work.
fn content_opportunities(graph: &UniverseGraph, created_at: DateTime<Utc>) -> Vec<Opportunity> {
    let mut completed_projects = 0usize;
    let mut awards = 0usize;
    let mut events = 0usize;
    let mut endorsements = 0usize;
    for node in graph.nodes().filter(|n| alive(n)) {
        match node.node_type {
            NodeType::Project if node.status == NodeStatus::Completed => {
                completed_projects += 1;
            }
            NodeType::Award => awards += 1,
            NodeType::Event => events += 1,
            NodeType::Endorsement => endorsements += 1,
            _ => {}
        }
    }

    let template = |id: &str, title: String, insight: String, next_step: String, confidence: u8| {
        Opportunity {
            id: OpportunityId::new(id),
            kind: OpportunityKind::Content,
            title,
            insight,
            reasoning: Vec::new(),
            path_nodes: Vec::new(),
            path_edges: Vec::new(),
            node_labels: Vec::new(),
            value_for_owner: "Public proof of work compounds on its own".to_string(),
            value_for_them: "Readers get a worked example, not a highlight reel".to_string(),
            mutual_benefit: "Published material answers questions before they are asked"
                .to_string(),
            next_step,
            action_steps: Vec::new(),
            effort: EffortLevel::Low,
            timeframe: "1-2 months".to_string(),
            confidence,
            novelty: 70,
            target_node: None,
            related_clusters: Vec::new(),
            status: OpportunityStatus::Suggested,
            source: OpportunitySource::Graph,
            created_at,
        }
    };

    let mut found = Vec::new();
    if completed_projects >= 3 {
        found.push(template(
            "opp-content-build-log",
            "Write the build-log series".to_string(),
            format!("{completed_projects} completed projects are publishable today"),
            "Outline one post per project, oldest first".to_string(),
            80,
        ));
    }
    if awards >= 1 && events >= 2 {
        found.push(template(
            "opp-content-talks",
            "Turn wins into talks".to_string(),
            "Award wins plus event history make a credible speaker profile".to_string(),
            "Pitch a talk to the next event on the calendar".to_string(),
            70,
        ));
    }
    if endorsements >= 2 {
        found.push(template(
            "opp-content-endorsements",
            "Collect endorsements into a public page".to_string(),
            format!("{endorsements} endorsements are sitting unpublished"),
            "Ask each endorser to confirm a one-line quote".to_string(),
            60,
        ));
    }
    found
}

/// Level-up targets: low-level clusters that are already moving.
fn level_up_opportunities(
    graph: &UniverseGraph,
    metrics: &BTreeMap<ClusterId, ClusterMetrics>,
    created_at: DateTime<Utc>,
) -> Vec<Opportunity> {
    let mut found = Vec::new();
    for (id, m) in metrics {
        if m.level > 2 || m.velocity <= LEVEL_UP_VELOCITY_FLOOR {
            continue;
        }
        let label = graph.cluster(id).map_or_else(|| id.to_string(), |c| c.label.clone());
        found.push(Opportunity {
            id: OpportunityId::new(format!("opp-gap-{id}")),
            kind: OpportunityKind::Gap,
            title: format!("Level up {label}"),
            insight: format!(
                "Momentum is there (velocity {}) but the base is thin (level {})",
                m.velocity, m.level
            ),
            reasoning: vec![
                format!("{label} is at level {} of 5", m.level),
                format!("Velocity {} means work is landing right now", m.velocity),
            ],
            path_nodes: Vec::new(),
            path_edges: Vec::new(),
            node_labels: Vec::new(),
            value_for_owner: "Momentum is cheapest to ride while it lasts".to_string(),
            value_for_them: String::new(),
            mutual_benefit: String::new(),
            next_step: format!("Add the next two nodes to {label}"),
            action_steps: Vec::new(),
            effort: EffortLevel::Medium,
            timeframe: "1-2 months".to_string(),
            confidence: 70,
            novelty: 50,
            target_node: None,
            related_clusters: vec![id.clone()],
            status: OpportunityStatus::Suggested,
            source: OpportunitySource::Graph,
            created_at,
        });
    }
    found
}

// =============================================================================
// MERGE
// =============================================================================

/// Reconcile stored opportunities with a fresh candidate set produced
/// by `source`.
///
/// - Candidates matching a moderated (approved/rejected) id are skipped.
/// - Candidates matching a suggestion update it, keeping `created_at`.
/// - On a graph-pattern pass, graph-sourced suggestions no longer
///   generated are removed. External drafts persist until the author
///   moderates them, so a draft pass removes nothing.
pub fn merge_opportunities(
    graph: &mut UniverseGraph,
    candidates: Vec<Opportunity>,
    source: OpportunitySource,
) -> OpportunityMergeOutcome {
    let mut outcome = OpportunityMergeOutcome {
        generated: candidates.len(),
        ..OpportunityMergeOutcome::default()
    };

    if source == OpportunitySource::Graph {
        let candidate_ids: BTreeSet<OpportunityId> =
            candidates.iter().map(|o| o.id.clone()).collect();
        let stale: Vec<OpportunityId> = graph
            .opportunities()
            .filter(|o| {
                o.source == OpportunitySource::Graph
                    && o.status == OpportunityStatus::Suggested
                    && !candidate_ids.contains(&o.id)
            })
            .map(|o| o.id.clone())
            .collect();
        for id in stale {
            graph.remove_opportunity(&id);
            outcome.removed = outcome.removed.saturating_add(1);
        }
    }

    for candidate in candidates {
        match graph.opportunity_mut(&candidate.id) {
            Some(existing) if existing.status != OpportunityStatus::Suggested => {
                outcome.skipped_moderated = outcome.skipped_moderated.saturating_add(1);
            }
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = candidate;
                existing.created_at = created_at;
                outcome.updated = outcome.updated.saturating_add(1);
            }
            None => {
                graph.insert_opportunity(candidate);
                outcome.inserted = outcome.inserted.saturating_add(1);
            }
        }
    }

    outcome
}

// =============================================================================
// EXTERNAL GENERATOR PROMPTS AND PARSING
// =============================================================================

/// Draft shape the external generator is asked to emit.
#[derive(Debug, Deserialize)]
struct OpportunityDraft {
    kind: String,
    title: String,
    insight: String,
    #[serde(default)]
    reasoning: Vec<String>,
    #[serde(default)]
    value_for_owner: String,
    #[serde(default)]
    value_for_them: String,
    #[serde(default)]
    mutual_benefit: String,
    next_step: String,
    #[serde(default)]
    action_steps: Vec<String>,
    effort: String,
    #[serde(default)]
    timeframe: String,
    confidence: u32,
    novelty: u32,
}

/// Build the prompt asking the generator for opportunity drafts.
///
/// Deterministic for a given graph: clusters and nodes are listed in
/// sorted order.
#[must_use]
pub fn build_opportunity_prompt(
    graph: &UniverseGraph,
    metrics: &BTreeMap<ClusterId, ClusterMetrics>,
) -> String {
    let mut prompt = String::from(
        "You advise the owner of a personal knowledge graph. \
         Below is the current state.\n\nClusters:\n",
    );
    for (id, m) in metrics {
        let label = graph.cluster(id).map_or_else(|| id.to_string(), |c| c.label.clone());
        prompt.push_str(&format!(
            "- {label}: level {}, score {}, velocity {} ({})\n",
            m.level,
            m.score,
            m.velocity,
            m.velocity_label()
        ));
    }

    let mut nodes: Vec<&Node> = graph.nodes().filter(|n| alive(n)).collect();
    nodes.sort_by(|a, b| b.impact_score.cmp(&a.impact_score).then_with(|| a.id.cmp(&b.id)));
    prompt.push_str("\nNotable nodes:\n");
    for node in nodes.iter().take(15) {
        prompt.push_str(&format!(
            "- {} ({}, impact {}, {})\n",
            node.label,
            node.node_type.as_str(),
            node.impact_score,
            node.verification_status.as_str()
        ));
    }

    prompt.push_str(
        "\nSuggest up to 5 concrete opportunities the owner has not seen. \
         Respond with ONLY a JSON array; each element:\n\
         {\"kind\": \"product|partnership|content|combination|timing\", \
         \"title\": \"...\", \"insight\": \"...\", \"reasoning\": [\"...\"], \
         \"value_for_owner\": \"...\", \"value_for_them\": \"...\", \
         \"mutual_benefit\": \"...\", \"next_step\": \"...\", \
         \"action_steps\": [\"...\"], \"effort\": \"low|medium|high\", \
         \"timeframe\": \"...\", \"confidence\": 0-100, \"novelty\": 0-100}\n",
    );
    prompt
}

/// Parse and validate a generator response into opportunities.
///
/// The response must contain a JSON array of drafts; anything malformed
/// fails the whole response. Confidence and novelty clamp to 100.
pub fn parse_opportunity_drafts(
    raw: &str,
    created_at: DateTime<Utc>,
) -> Result<Vec<Opportunity>, OrreryError> {
    let slice = extract_json(raw, '[', ']')?;
    let drafts: Vec<OpportunityDraft> = serde_json::from_str(slice)
        .map_err(|e| OrreryError::Generation(format!("draft array did not parse: {e}")))?;

    let mut used_ids: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if draft.title.trim().is_empty()
            || draft.insight.trim().is_empty()
            || draft.next_step.trim().is_empty()
        {
            return Err(OrreryError::Generation(
                "draft missing title, insight, or next_step".to_string(),
            ));
        }
        let kind = OpportunityKind::from_str(&draft.kind)
            .map_err(|_| OrreryError::Generation(format!("unknown draft kind {:?}", draft.kind)))?;
        let effort = EffortLevel::from_str(&draft.effort)
            .map_err(|_| OrreryError::Generation(format!("unknown draft effort {:?}", draft.effort)))?;

        let base = format!("opp-llm-{}", slugify(&draft.title));
        let mut id = base.clone();
        let mut n = 1usize;
        while !used_ids.insert(id.clone()) {
            n += 1;
            id = format!("{base}-{n}");
        }

        out.push(Opportunity {
            id: OpportunityId::new(id),
            kind,
            title: draft.title,
            insight: draft.insight,
            reasoning: draft.reasoning,
            path_nodes: Vec::new(),
            path_edges: Vec::new(),
            node_labels: Vec::new(),
            value_for_owner: draft.value_for_owner,
            value_for_them: draft.value_for_them,
            mutual_benefit: draft.mutual_benefit,
            next_step: draft.next_step,
            action_steps: draft.action_steps,
            effort,
            timeframe: if draft.timeframe.is_empty() {
                "unscheduled".to_string()
            } else {
                draft.timeframe
            },
            confidence: draft.confidence.min(100) as u8,
            novelty: draft.novelty.min(100) as u8,
            target_node: None,
            related_clusters: Vec::new(),
            status: OpportunityStatus::Suggested,
            source: OpportunitySource::Llm,
            created_at,
        });
    }
    Ok(out)
}

/// Build the prompt for a single outreach message about one node.
#[must_use]
pub fn build_outreach_prompt(
    graph: &UniverseGraph,
    node: &Node,
    context: Option<&str>,
    specific_ask: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Draft a short, warm outreach email about {} ({}).\n",
        node.label,
        node.node_type.as_str()
    );
    if let Some(description) = &node.description {
        prompt.push_str(&format!("About: {description}\n"));
    }
    let relations: Vec<String> = connections(graph, &node.id)
        .into_iter()
        .map(|(other, edge)| format!("{} {} {}", node.label, edge.edge_type.as_str(), other.label))
        .collect();
    if !relations.is_empty() {
        prompt.push_str("Relations:\n");
        for relation in relations {
            prompt.push_str(&format!("- {relation}\n"));
        }
    }
    if let Some(context) = context {
        prompt.push_str(&format!("Context: {context}\n"));
    }
    if let Some(ask) = specific_ask {
        prompt.push_str(&format!("The specific ask: {ask}\n"));
    }
    prompt.push_str(
        "Respond with ONLY a JSON object: {\"subject\": \"...\", \"draft\": \"...\"}\n",
    );
    prompt
}

/// Parse a generator response into an outreach message.
pub fn parse_outreach(raw: &str) -> Result<OutreachMessage, OrreryError> {
    let slice = extract_json(raw, '{', '}')?;
    let message: OutreachMessage = serde_json::from_str(slice)
        .map_err(|e| OrreryError::Generation(format!("outreach did not parse: {e}")))?;
    if message.subject.trim().is_empty() || message.draft.trim().is_empty() {
        return Err(OrreryError::Generation(
            "outreach missing subject or draft".to_string(),
        ));
    }
    Ok(message)
}

/// Slice out the outermost JSON value between `open` and `close`.
///
/// Generators wrap JSON in prose and code fences; everything outside the
/// first `open` and last `close` is discarded.
fn extract_json(raw: &str, open: char, close: char) -> Result<&str, OrreryError> {
    let start = raw
        .find(open)
        .ok_or_else(|| OrreryError::Generation(format!("no {open:?} in response")))?;
    let end = raw
        .rfind(close)
        .filter(|&end| end > start)
        .ok_or_else(|| OrreryError::Generation(format!("no closing {close:?} in response")))?;
    Ok(&raw[start..=end])
}

/// Lowercase alphanumeric slug, runs of other characters collapsed to a
/// single dash, at most 40 characters.
fn slugify(s: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= 40 {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}

// =============================================================================
// TESTS
// =============================================================================
