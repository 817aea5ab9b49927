//! Graph storage abstraction consumed by the level engine and the snapshot
//! assembler.

use std::collections::HashMap;

use async_trait::async_trait;
use crossover_core::{EdgeRecord, NodeId, NodeRecord, StorageError};

/// Result type for graph store calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// Source node -> destinations of its approved outgoing edges.
pub type Adjacency = HashMap<NodeId, Vec<NodeId>>;

/// Assign `level` to every edge whose destination is one of `to_nodes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUpdate {
    pub level: u32,
    pub to_nodes: Vec<NodeId>,
}

/// Graph storage used by the level engine.
///
/// Implementations must apply a batch of level updates atomically: either
/// every update in the slice lands or none does.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Identifiers of every node flagged as a root.
    async fn list_root_nodes(&self) -> StorageResult<Vec<NodeId>>;

    /// Approved adjacency in one bulk read, grouped by source node.
    ///
    /// An edge is listed iff at least one of its evidence records is
    /// approved.
    async fn approved_adjacency(&self) -> StorageResult<Adjacency>;

    /// Apply a batch of level updates in a single transaction.
    async fn apply_level_updates(&self, updates: &[LevelUpdate]) -> StorageResult<()>;

    /// Every node record.
    async fn list_nodes(&self) -> StorageResult<Vec<NodeRecord>>;

    /// Every edge with its evidence, approved or not.
    async fn list_edges(&self) -> StorageResult<Vec<EdgeRecord>>;
}
