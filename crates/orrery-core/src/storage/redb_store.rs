//! # redb-backed Universe Storage
//!
//! A disk-backed store for the universe graph using the redb embedded
//! database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Integration with Universe
//!
//! The engine reads and scores an in-memory `UniverseGraph`; the store
//! is its durability layer. The graph is loaded once at startup and
//! every mutation writes through: single-entity upserts for inserts,
//! one transaction per moderation batch, and a table rewrite when a
//! detector regenerates its whole collection. After an I/O error the
//! disk lags memory until the next successful write of the same rows.

use crate::graph::{SerializableUniverse, UniverseGraph};
use crate::primitives;
use crate::types::{
    AuditRecord, Cluster, Edge, GapId, LearningGap, Node, Opportunity, OpportunityId, OrreryError,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for nodes: node id -> postcard-serialized `Node`.
const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Table for edges: edge id -> postcard-serialized `Edge`.
const EDGES: TableDefinition<&str, &[u8]> = TableDefinition::new("edges");

/// Table for clusters: cluster id -> postcard-serialized `Cluster`.
const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");

/// Table for learning gaps: gap id -> postcard-serialized `LearningGap`.
const GAPS: TableDefinition<&str, &[u8]> = TableDefinition::new("gaps");

/// Table for opportunities: opportunity id -> postcard-serialized `Opportunity`.
const OPPORTUNITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("opportunities");

/// Table for the audit trail: audit id -> postcard-serialized `AuditRecord`.
///
/// Audit ids are zero-padded sequence numbers, so key order is append
/// order.
const AUDIT: TableDefinition<&str, &[u8]> = TableDefinition::new("audit");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed universe store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

fn io_err(e: impl std::fmt::Display) -> OrreryError {
    OrreryError::IoError(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, OrreryError> {
    postcard::to_allocvec(value).map_err(|e| OrreryError::SerializationError(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, OrreryError> {
    postcard::from_bytes(bytes).map_err(|e| OrreryError::DeserializationError(e.to_string()))
}

impl RedbStore {
    /// Open or create a universe database at the given path.
    ///
    /// Rejects databases written by a newer format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OrreryError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        {
            let write_txn = db.begin_write().map_err(io_err)?;
            {
                let _ = write_txn.open_table(NODES).map_err(io_err)?;
                let _ = write_txn.open_table(EDGES).map_err(io_err)?;
                let _ = write_txn.open_table(CLUSTERS).map_err(io_err)?;
                let _ = write_txn.open_table(GAPS).map_err(io_err)?;
                let _ = write_txn.open_table(OPPORTUNITIES).map_err(io_err)?;
                let _ = write_txn.open_table(AUDIT).map_err(io_err)?;

                let mut meta_table = write_txn.open_table(METADATA).map_err(io_err)?;
                let stored_version = meta_table
                    .get("format_version")
                    .map_err(io_err)?
                    .map(|v| v.value());
                match stored_version {
                    Some(version) if version > u64::from(primitives::FORMAT_VERSION) => {
                        return Err(OrreryError::DeserializationError(format!(
                            "database format version {version} is newer than supported {}",
                            primitives::FORMAT_VERSION
                        )));
                    }
                    Some(_) => {}
                    None => {
                        meta_table
                            .insert("format_version", u64::from(primitives::FORMAT_VERSION))
                            .map_err(io_err)?;
                    }
                }
            }
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Load the full graph from disk.
    ///
    /// Rebuilds through the same path as a deserialized snapshot, so
    /// rows that reference missing endpoints are dropped, not errors.
    pub fn load(&self) -> Result<UniverseGraph, OrreryError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;

        fn read_all<T: serde::de::DeserializeOwned>(
            txn: &redb::ReadTransaction,
            def: TableDefinition<&str, &[u8]>,
        ) -> Result<Vec<T>, OrreryError> {
            let table = txn.open_table(def).map_err(io_err)?;
            let mut out = Vec::new();
            for entry in table.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                out.push(decode(value.value())?);
            }
            Ok(out)
        }

        let snapshot = SerializableUniverse {
            nodes: read_all(&read_txn, NODES)?,
            edges: read_all(&read_txn, EDGES)?,
            clusters: read_all(&read_txn, CLUSTERS)?,
            gaps: read_all(&read_txn, GAPS)?,
            opportunities: read_all(&read_txn, OPPORTUNITIES)?,
            audit_log: read_all(&read_txn, AUDIT)?,
        };

        Ok(UniverseGraph::from(snapshot))
    }

    /// Replace the entire database contents with the given graph in one
    /// transaction. Used by imports and migrations.
    pub fn save(&self, graph: &UniverseGraph) -> Result<(), OrreryError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            for def in [NODES, EDGES, CLUSTERS, GAPS, OPPORTUNITIES, AUDIT] {
                let _ = write_txn.delete_table(def).map_err(io_err)?;
            }

            let mut nodes_table = write_txn.open_table(NODES).map_err(io_err)?;
            for node in graph.nodes() {
                nodes_table
                    .insert(node.id.as_str(), encode(node)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut edges_table = write_txn.open_table(EDGES).map_err(io_err)?;
            for edge in graph.edges() {
                edges_table
                    .insert(edge.id.as_str(), encode(edge)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut clusters_table = write_txn.open_table(CLUSTERS).map_err(io_err)?;
            for cluster in graph.clusters() {
                clusters_table
                    .insert(cluster.id.as_str(), encode(cluster)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut gaps_table = write_txn.open_table(GAPS).map_err(io_err)?;
            for gap in graph.gaps() {
                gaps_table
                    .insert(gap.id.as_str(), encode(gap)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut opps_table = write_txn.open_table(OPPORTUNITIES).map_err(io_err)?;
            for opportunity in graph.opportunities() {
                opps_table
                    .insert(opportunity.id.as_str(), encode(opportunity)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut audit_table = write_txn.open_table(AUDIT).map_err(io_err)?;
            for record in graph.audit_log() {
                audit_table
                    .insert(record.id.as_str(), encode(record)?.as_slice())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), OrreryError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    // =========================================================================
    // SINGLE-ENTITY WRITE-THROUGH
    // =========================================================================

    fn put_row(
        &self,
        def: TableDefinition<&str, &[u8]>,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), OrreryError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(def).map_err(io_err)?;
            table.insert(key, bytes).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn remove_row(&self, def: TableDefinition<&str, &[u8]>, key: &str) -> Result<(), OrreryError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(def).map_err(io_err)?;
            let _ = table.remove(key).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Insert or replace a node row.
    pub fn put_node(&self, node: &Node) -> Result<(), OrreryError> {
        self.put_row(NODES, node.id.as_str(), &encode(node)?)
    }

    /// Insert or replace an edge row.
    pub fn put_edge(&self, edge: &Edge) -> Result<(), OrreryError> {
        self.put_row(EDGES, edge.id.as_str(), &encode(edge)?)
    }

    /// Insert or replace a cluster row.
    pub fn put_cluster(&self, cluster: &Cluster) -> Result<(), OrreryError> {
        self.put_row(CLUSTERS, cluster.id.as_str(), &encode(cluster)?)
    }

    /// Insert or replace a gap row.
    pub fn put_gap(&self, gap: &LearningGap) -> Result<(), OrreryError> {
        self.put_row(GAPS, gap.id.as_str(), &encode(gap)?)
    }

    /// Insert or replace an opportunity row.
    pub fn put_opportunity(&self, opportunity: &Opportunity) -> Result<(), OrreryError> {
        self.put_row(OPPORTUNITIES, opportunity.id.as_str(), &encode(opportunity)?)
    }

    /// Remove a gap row.
    pub fn remove_gap(&self, id: &GapId) -> Result<(), OrreryError> {
        self.remove_row(GAPS, id.as_str())
    }

    /// Remove an opportunity row.
    pub fn remove_opportunity(&self, id: &OpportunityId) -> Result<(), OrreryError> {
        self.remove_row(OPPORTUNITIES, id.as_str())
    }

    /// Append an audit record, keyed by its sequential id.
    pub fn append_audit(&self, record: &AuditRecord) -> Result<(), OrreryError> {
        self.put_row(AUDIT, record.id.as_str(), &encode(record)?)
    }

    // =========================================================================
    // BATCHED WRITES
    // =========================================================================

    /// Persist the outcome of a moderation pass in a single transaction.
    ///
    /// A batch of 500 status flips costs one fsync, not 500.
    pub fn persist_moderation(
        &self,
        nodes: &[&Node],
        edges: &[&Edge],
        audits: &[&AuditRecord],
    ) -> Result<(), OrreryError> {
        if nodes.is_empty() && edges.is_empty() && audits.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut nodes_table = write_txn.open_table(NODES).map_err(io_err)?;
            for node in nodes {
                nodes_table
                    .insert(node.id.as_str(), encode(*node)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut edges_table = write_txn.open_table(EDGES).map_err(io_err)?;
            for edge in edges {
                edges_table
                    .insert(edge.id.as_str(), encode(*edge)?.as_slice())
                    .map_err(io_err)?;
            }

            let mut audit_table = write_txn.open_table(AUDIT).map_err(io_err)?;
            for record in audits {
                audit_table
                    .insert(record.id.as_str(), encode(*record)?.as_slice())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Rewrite the gaps table to match the graph's current gap set.
    ///
    /// Detector refreshes insert, update, and close in one pass; a table
    /// rewrite in one transaction is simpler than diffing.
    pub fn sync_gaps(&self, graph: &UniverseGraph) -> Result<(), OrreryError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let _ = write_txn.delete_table(GAPS).map_err(io_err)?;
            let mut gaps_table = write_txn.open_table(GAPS).map_err(io_err)?;
            for gap in graph.gaps() {
                gaps_table
                    .insert(gap.id.as_str(), encode(gap)?.as_slice())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Rewrite the opportunities table to match the graph's current set.
    pub fn sync_opportunities(&self, graph: &UniverseGraph) -> Result<(), OrreryError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let _ = write_txn.delete_table(OPPORTUNITIES).map_err(io_err)?;
            let mut opps_table = write_txn.open_table(OPPORTUNITIES).map_err(io_err)?;
            for opportunity in graph.opportunities() {
                opps_table
                    .insert(opportunity.id.as_str(), encode(opportunity)?.as_slice())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AuditAction, EdgeType, GapKind, GapStatus, MonthStamp, NodeId, NodeType,
        VerificationStatus,
    };
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn stamp() -> MonthStamp {
        MonthStamp::parse("2025-04").expect("stamp")
    }

    fn node(id: &str) -> Node {
        Node::new(id, id.to_uppercase(), NodeType::Project, stamp(), epoch())
    }

    fn gap(id: &str) -> LearningGap {
        LearningGap {
            id: crate::types::GapId::new(id),
            kind: GapKind::IncompleteNode,
            label: format!("fill in {id}"),
            priority_score: 60,
            effort_score: 35,
            roi_score: 17,
            related_nodes: Vec::new(),
            cluster: None,
            status: GapStatus::Open,
            is_auto_detected: true,
            created_at: epoch(),
        }
    }

    fn audit(seq: usize, entity_id: &str) -> AuditRecord {
        AuditRecord {
            id: format!("audit-{seq:06}"),
            action: AuditAction::Approve,
            entity_kind: "node".to_string(),
            entity_id: entity_id.to_string(),
            previous_value: Some("pending".to_string()),
            new_value: Some("verified".to_string()),
            reason: None,
            created_by: "admin".to_string(),
            created_at: epoch(),
        }
    }

    #[test]
    fn basic_write_through_and_load() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        store.put_node(&node("me")).expect("put node");
        store.put_node(&node("proj")).expect("put node");
        store
            .put_edge(&Edge::new("e1", "me", "proj", EdgeType::BuiltWith, epoch()))
            .expect("put edge");
        store
            .put_cluster(&Cluster::new("robotics", "Robotics", "#ff6b35"))
            .expect("put cluster");

        let graph = store.load().expect("load");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.cluster(&crate::types::ClusterId::new("robotics")).is_some());
    }

    #[test]
    fn contents_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("universe.redb");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            store.put_node(&node("me")).expect("put node");
            store.append_audit(&audit(1, "me")).expect("append audit");
        }

        {
            let store = RedbStore::open(&db_path).expect("open db");
            let graph = store.load().expect("load");
            assert_eq!(graph.node_count(), 1);
            assert_eq!(graph.audit_log().len(), 1);
        }
    }

    #[test]
    fn put_replaces_existing_row() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        store.put_node(&node("me")).expect("put node");
        let mut updated = node("me");
        updated.verification_status = VerificationStatus::Verified;
        store.put_node(&updated).expect("put node");

        let graph = store.load().expect("load");
        assert_eq!(graph.node_count(), 1);
        let loaded = graph.node(&NodeId::new("me")).expect("node");
        assert_eq!(loaded.verification_status, VerificationStatus::Verified);
    }

    #[test]
    fn save_replaces_everything() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        let mut first = UniverseGraph::new();
        first.insert_node(node("a"));
        first.insert_node(node("b"));
        store.save(&first).expect("save");
        assert_eq!(store.load().expect("load").node_count(), 2);

        let mut second = UniverseGraph::new();
        second.insert_node(node("c"));
        store.save(&second).expect("save");

        let graph = store.load().expect("load");
        assert_eq!(graph.node_count(), 1);
        assert!(graph.contains_node(&NodeId::new("c")));
    }

    #[test]
    fn moderation_batch_is_one_transaction() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        store.put_node(&node("me")).expect("put node");
        let mut flipped = node("me");
        flipped.verification_status = VerificationStatus::Verified;
        let record = audit(1, "me");

        store
            .persist_moderation(&[&flipped], &[], &[&record])
            .expect("persist");

        let graph = store.load().expect("load");
        let loaded = graph.node(&NodeId::new("me")).expect("node");
        assert_eq!(loaded.verification_status, VerificationStatus::Verified);
        assert_eq!(graph.audit_log().len(), 1);
    }

    #[test]
    fn audit_records_load_in_append_order() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        // Insert out of order; zero-padded keys still sort sequentially.
        store.append_audit(&audit(2, "b")).expect("append");
        store.append_audit(&audit(1, "a")).expect("append");

        let graph = store.load().expect("load");
        let ids: Vec<_> = graph.audit_log().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["audit-000001", "audit-000002"]);
    }

    #[test]
    fn sync_gaps_rewrites_the_table() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        let mut graph = UniverseGraph::new();
        graph.insert_gap(gap("gap-incomplete-a"));
        graph.insert_gap(gap("gap-incomplete-b"));
        store.sync_gaps(&graph).expect("sync");
        assert_eq!(store.load().expect("load").gaps().count(), 2);

        graph.remove_gap(&GapId::new("gap-incomplete-a"));
        store.sync_gaps(&graph).expect("sync");

        let loaded = store.load().expect("load");
        let ids: Vec<_> = loaded.gaps().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["gap-incomplete-b"]);
    }

    #[test]
    fn dangling_edge_rows_are_dropped_on_load() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("universe.redb")).expect("open db");

        store.put_node(&node("me")).expect("put node");
        store.put_node(&node("proj")).expect("put node");
        store
            .put_edge(&Edge::new("e1", "me", "proj", EdgeType::BuiltWith, epoch()))
            .expect("put edge");
        // A row referencing a node that was never written.
        store
            .put_edge(&Edge::new("e2", "me", "ghost", EdgeType::Uses, epoch()))
            .expect("put edge");

        let graph = store.load().expect("load");
        assert_eq!(graph.edge_count(), 1);
    }
}
