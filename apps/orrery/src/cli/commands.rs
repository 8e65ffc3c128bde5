//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command loads the universe from the selected backend, does its
//! work, and saves when it mutated anything. The redb backend writes
//! through on mutation, so saving is a no-op there; the memory backend
//! snapshots the whole graph back to the database path.

use crate::api::{self, AppState};
use crate::config::{FileConfig, ServerConfig, generator_from_env};
use orrery_core::{
    AccessMode, EntityKind, ModerationAction, Opportunity, OpportunityStatus, OrreryError,
    Universe,
    export::{canonical_checksum, canonical_crypto_hash},
    graph_from_bytes, graph_to_bytes,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// ACID single-file database, writes through on every mutation.
    Redb,
    /// In-memory graph, snapshotted to the database path on save.
    Memory,
}

impl Backend {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for Backend {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(OrreryError::Validation(format!(
                "unknown backend: {other:?} (use redb or memory)"
            ))),
        }
    }
}

/// Resolve the backend from an optional flag/config value. Defaults to
/// redb.
pub fn resolve_backend(requested: Option<&str>) -> Result<Backend, OrreryError> {
    requested.unwrap_or("redb").parse()
}

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for imports and memory-backend snapshots (64 MB).
///
/// This prevents memory exhaustion from malicious or accidental large
/// files; the canonical format's own entity caps bind well below this.
const MAX_IMPORT_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), OrreryError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| OrreryError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(OrreryError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes to resolve symlinks and `..`, and requires an existing
/// regular file, so a path like `../../etc/passwd` resolves to what it
/// really points at before any read happens.
fn validate_file_path(path: &Path) -> Result<PathBuf, OrreryError> {
    let canonical = path.canonicalize().map_err(|e| {
        OrreryError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(OrreryError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output file path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, OrreryError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        OrreryError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(OrreryError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| OrreryError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

/// Load or create a universe from a database path with the selected
/// backend.
pub fn load_or_create_universe(db_path: &Path, backend: Backend) -> Result<Universe, OrreryError> {
    match backend {
        Backend::Redb => Universe::open(db_path),
        Backend::Memory => {
            if db_path.exists() {
                let validated = validate_file_path(db_path)?;
                validate_file_size(&validated, MAX_IMPORT_FILE_SIZE)?;
                let data = std::fs::read(&validated)
                    .map_err(|e| OrreryError::IoError(format!("Read db: {}", e)))?;
                let graph = graph_from_bytes(&data)?;
                Ok(Universe::with_graph(graph))
            } else {
                Ok(Universe::in_memory())
            }
        }
    }
}

/// Save a universe back to its database path.
pub fn save_universe(universe: &Universe, db_path: &Path) -> Result<(), OrreryError> {
    if universe.is_persistent() {
        // Redb writes through on every mutation; nothing to do.
        return Ok(());
    }
    let data = graph_to_bytes(universe.graph())?;
    std::fs::write(db_path, &data).map_err(|e| OrreryError::IoError(format!("Write db: {}", e)))?;
    Ok(())
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(
    db_path: &Path,
    backend: Backend,
    file: &FileConfig,
    host: Option<&str>,
    port: Option<u16>,
) -> Result<(), OrreryError> {
    let universe = load_or_create_universe(db_path, backend)?;
    let generator = generator_from_env()?;
    let config = ServerConfig::resolve(file, host, port);

    println!("Orrery Universe Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", config.host);
    println!("  Port:      {}", config.port);
    println!("  Backend:   {}", backend.as_str());
    println!("  Database:  {:?}", db_path);
    println!("  Generator: {}", generator.backend_name());
    println!();
    println!("Endpoints:");
    println!("  GET   /health                    - Health check");
    println!("  GET   /nodes/{{id}}                - Node detail");
    println!("  GET   /clusters                  - Cluster scores");
    println!("  GET   /stats                     - Universe totals");
    println!("  GET   /learning-gaps             - Learning gaps (private)");
    println!("  PATCH /learning-gaps/{{id}}        - Update a gap (private)");
    println!("  GET   /opportunities/intelligent - Opportunities (private)");
    println!("  PATCH /opportunities/{{id}}        - Moderate one (private)");
    println!("  GET   /verification-queue        - Moderation queue (private)");
    println!("  POST  /verify                    - Moderate an entity (private)");
    println!("  POST  /verify-batch              - Moderate a batch (private)");
    println!("  POST  /nodes                     - Insert a node (private)");
    println!("  POST  /edges                     - Insert an edge (private)");
    println!("  POST  /generate-outreach         - Draft outreach (private)");
    println!("  GET   /export                    - Canonical export (private)");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(universe, generator);
    let handle = state.universe.clone();
    api::run_server(&config, state).await?;

    // Graceful shutdown: snapshot memory-backend state back to disk.
    let universe = handle.read().await;
    save_universe(&universe, db_path)
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show universe totals and per-cluster scores.
pub fn cmd_status(db_path: &Path, backend: Backend, json_mode: bool) -> Result<(), OrreryError> {
    let universe = load_or_create_universe(db_path, backend)?;
    let stats = universe.stats(AccessMode::Private);
    let clusters = universe.cluster_views(AccessMode::Private);

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend.as_str(),
            "stats": stats,
            "clusters": clusters,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Orrery Universe Status");
    println!("======================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend.as_str());
    println!();
    println!(
        "Nodes:    {} total, {} verified",
        stats.total_nodes, stats.verified_nodes
    );
    println!(
        "Edges:    {} total, {} verified",
        stats.total_edges, stats.verified_edges
    );
    println!("Clusters: {}", stats.total_clusters);
    if let (Some(nodes), Some(edges)) = (stats.pending_nodes, stats.pending_edges) {
        println!("Pending:  {} nodes, {} edges", nodes, edges);
    }
    println!();

    if clusters.is_empty() {
        println!("No clusters defined");
    } else {
        println!(
            "{:<28} {:>5} {:>5} {:>8}  {}",
            "Cluster", "Level", "Score", "Velocity", "Trend"
        );
        for cluster in &clusters {
            println!(
                "{:<28} {:>5} {:>5} {:>8}  {}",
                cluster.label, cluster.level, cluster.score, cluster.velocity,
                cluster.velocity_label
            );
        }
    }

    Ok(())
}

// =============================================================================
// QUEUE COMMAND
// =============================================================================

/// Show the moderation queue.
pub fn cmd_queue(db_path: &Path, backend: Backend, json_mode: bool) -> Result<(), OrreryError> {
    let universe = load_or_create_universe(db_path, backend)?;
    let queue = universe.verification_queue();

    if json_mode {
        let output = serde_json::json!({ "queue": queue });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Orrery Verification Queue");
    println!("=========================");
    println!();
    println!("Pending nodes:   {}", queue.stats.pending_nodes);
    println!("Pending edges:   {}", queue.stats.pending_edges);
    println!("High confidence: {}", queue.stats.high_confidence);
    println!("Low confidence:  {}", queue.stats.low_confidence);

    if !queue.pending_nodes.is_empty() {
        println!();
        println!("Nodes awaiting review:");
        for node in queue.pending_nodes.iter().take(10) {
            println!("  {:<32} {}", node.id, node.label);
        }
        if queue.pending_nodes.len() > 10 {
            println!("  ... and {} more", queue.pending_nodes.len() - 10);
        }
    }

    if !queue.pending_edges.is_empty() {
        println!();
        println!("Edges awaiting review:");
        for entry in queue.pending_edges.iter().take(10) {
            println!(
                "  {:<32} {} -> {} (confidence {})",
                entry.edge.id, entry.edge.source, entry.edge.target, entry.confidence.score
            );
        }
        if queue.pending_edges.len() > 10 {
            println!("  ... and {} more", queue.pending_edges.len() - 10);
        }
    }

    Ok(())
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

/// Apply a moderation action to one node or edge.
pub fn cmd_verify(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    entity_type: &str,
    entity_id: &str,
    action: &str,
    reason: Option<&str>,
) -> Result<(), OrreryError> {
    let entity_kind: EntityKind = entity_type.parse()?;
    let action: ModerationAction = action.parse()?;

    let mut universe = load_or_create_universe(db_path, backend)?;
    let outcome = universe.verify(entity_kind, entity_id, action, reason, "cli")?;
    save_universe(&universe, db_path)?;

    if json_mode {
        let output = serde_json::json!({ "outcome": outcome });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{} {}: {} -> {}{}",
        outcome.entity_kind.as_str(),
        outcome.entity_id,
        outcome.previous.as_str(),
        outcome.current.as_str(),
        if outcome.changed { "" } else { " (no change)" }
    );

    Ok(())
}

// =============================================================================
// GAPS COMMAND
// =============================================================================

/// List learning gaps, optionally re-running detection first.
pub fn cmd_gaps(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    refresh: bool,
) -> Result<(), OrreryError> {
    let mut universe = load_or_create_universe(db_path, backend)?;

    if refresh {
        let outcome = universe.refresh_gaps()?;
        save_universe(&universe, db_path)?;
        if !json_mode {
            println!(
                "Detection pass: {} candidates, {} new, {} updated, {} removed",
                outcome.detected, outcome.inserted, outcome.updated, outcome.removed
            );
            println!();
        }
    }

    let gaps = universe.gap_views();

    if json_mode {
        let output = serde_json::json!({ "gaps": gaps });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Orrery Learning Gaps");
    println!("====================");
    println!();
    if gaps.is_empty() {
        println!("No open gaps");
        return Ok(());
    }

    println!(
        "{:>8} {:>6} {:>4}  {}",
        "Priority", "Effort", "ROI", "Gap"
    );
    for view in &gaps {
        println!(
            "{:>8} {:>6} {:>4}  {}",
            view.gap.priority_score, view.gap.effort_score, view.gap.roi_score, view.gap.label
        );
        if let Some(label) = &view.cluster_label {
            println!("{:>21}  cluster: {}", "", label);
        }
    }

    Ok(())
}

// =============================================================================
// OPPORTUNITIES COMMAND
// =============================================================================

/// Regenerate and list graph-pattern opportunities.
///
/// The CLI never calls the text generator; generator-sourced drafts
/// only enter through the HTTP surface.
pub fn cmd_opportunities(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
) -> Result<(), OrreryError> {
    let mut universe = load_or_create_universe(db_path, backend)?;
    let merge = universe.regenerate_opportunities()?;
    save_universe(&universe, db_path)?;

    let mut opportunities: Vec<&Opportunity> = universe
        .opportunities()
        .filter(|o| o.status != OpportunityStatus::Rejected)
        .collect();
    opportunities.sort_by(|a, b| {
        let left = u32::from(a.confidence) * u32::from(a.novelty);
        let right = u32::from(b.confidence) * u32::from(b.novelty);
        right.cmp(&left).then_with(|| a.id.cmp(&b.id))
    });

    if json_mode {
        let output = serde_json::json!({
            "merge": merge,
            "opportunities": opportunities,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Orrery Opportunities");
    println!("====================");
    println!(
        "Generated {}, stored {} new, {} updated, {} removed",
        merge.generated, merge.inserted, merge.updated, merge.removed
    );
    println!();
    if opportunities.is_empty() {
        println!("No opportunities detected");
        return Ok(());
    }

    for opportunity in &opportunities {
        println!(
            "[{:>11}] {} (confidence {}, novelty {})",
            opportunity.kind.as_str(),
            opportunity.title,
            opportunity.confidence,
            opportunity.novelty
        );
        println!("              next: {}", opportunity.next_step);
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write a canonical snapshot to a file.
pub fn cmd_export(db_path: &Path, backend: Backend, output: &Path) -> Result<(), OrreryError> {
    let validated_output = validate_output_path(output)?;

    let universe = load_or_create_universe(db_path, backend)?;
    let data = universe.export_canonical()?;
    let checksum = canonical_checksum(universe.graph())?;
    let hash = canonical_crypto_hash(universe.graph())?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| OrreryError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    println!("Checksum: {}", checksum);
    println!("BLAKE3:   {}", hash);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Restore the universe from a canonical snapshot.
pub fn cmd_import(db_path: &Path, backend: Backend, input: &Path) -> Result<(), OrreryError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| OrreryError::IoError(format!("Read file: {}", e)))?;

    let mut universe = load_or_create_universe(db_path, backend)?;
    let outcome = universe.import_canonical(&data)?;
    save_universe(&universe, db_path)?;

    println!("Imported {} nodes, {} edges", outcome.nodes, outcome.edges);

    Ok(())
}
