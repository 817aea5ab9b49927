//! In-memory graph store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use crossover_core::{
    EdgeId, EdgeRecord, EvidenceId, EvidenceRecord, EvidenceStatus, NodeId, NodeRecord,
    StorageError,
};

use crate::store::{Adjacency, GraphStore, LevelUpdate, StorageResult};

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<NodeId, NodeRecord>,
    edges: HashMap<EdgeId, EdgeRecord>,
}

/// Graph store held in process memory.
///
/// Nodes and edges sit behind a single lock, so a level batch is applied
/// atomically with respect to every other call.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, GraphState>> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, GraphState>> {
        self.state.write().map_err(|_| StorageError::LockPoisoned)
    }

    /// Insert or replace a node.
    pub fn add_node(&self, node: NodeRecord) -> StorageResult<()> {
        self.write()?.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert a new edge between existing nodes.
    pub fn add_edge(
        &self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        kind: impl Into<String>,
    ) -> StorageResult<EdgeId> {
        let edge = EdgeRecord::new(from, to, kind);
        let mut state = self.write()?;

        for endpoint in [&edge.from, &edge.to] {
            if !state.nodes.contains_key(endpoint) {
                return Err(StorageError::NodeNotFound {
                    id: endpoint.to_string(),
                });
            }
        }
        if state
            .edges
            .values()
            .any(|e| e.from == edge.from && e.to == edge.to && e.kind == edge.kind)
        {
            return Err(StorageError::DuplicateEdge {
                from: edge.from.to_string(),
                to: edge.to.to_string(),
                kind: edge.kind,
            });
        }

        let id = edge.edge_id;
        state.edges.insert(id, edge);
        Ok(id)
    }

    pub fn remove_edge(&self, id: EdgeId) -> StorageResult<EdgeRecord> {
        self.write()?
            .edges
            .remove(&id)
            .ok_or_else(|| StorageError::EdgeNotFound { id: id.to_string() })
    }

    /// Remove a node together with every edge touching it. Returns the
    /// number of edges removed.
    pub fn remove_node(&self, id: &NodeId) -> StorageResult<usize> {
        let mut state = self.write()?;
        if state.nodes.remove(id).is_none() {
            return Err(StorageError::NodeNotFound { id: id.to_string() });
        }
        let before = state.edges.len();
        state.edges.retain(|_, e| &e.from != id && &e.to != id);
        Ok(before - state.edges.len())
    }

    /// Attach a new evidence record to an edge.
    pub fn add_evidence(&self, edge: EdgeId, status: EvidenceStatus) -> StorageResult<EvidenceId> {
        let mut state = self.write()?;
        let record = state
            .edges
            .get_mut(&edge)
            .ok_or_else(|| StorageError::EdgeNotFound {
                id: edge.to_string(),
            })?;
        let evidence = EvidenceRecord::new(status);
        let id = evidence.evidence_id;
        record.evidence.push(evidence);
        Ok(id)
    }

    /// Change the status of an evidence record. Returns the previous status.
    pub fn set_evidence_status(
        &self,
        evidence: EvidenceId,
        status: EvidenceStatus,
    ) -> StorageResult<EvidenceStatus> {
        let mut state = self.write()?;
        let record = state
            .edges
            .values_mut()
            .flat_map(|e| e.evidence.iter_mut())
            .find(|e| e.evidence_id == evidence)
            .ok_or_else(|| StorageError::EvidenceNotFound {
                id: evidence.to_string(),
            })?;
        Ok(std::mem::replace(&mut record.status, status))
    }

    pub fn edge(&self, id: EdgeId) -> StorageResult<Option<EdgeRecord>> {
        Ok(self.read()?.edges.get(&id).cloned())
    }

    /// Stored level of every edge, keyed by `(from, to)`.
    pub fn edge_levels(&self) -> StorageResult<HashMap<(NodeId, NodeId), Option<u32>>> {
        Ok(self
            .read()?
            .edges
            .values()
            .map(|e| ((e.from.clone(), e.to.clone()), e.level))
            .collect())
    }

    pub fn node_count(&self) -> usize {
        self.read().map(|s| s.nodes.len()).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.read().map(|s| s.edges.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn list_root_nodes(&self) -> StorageResult<Vec<NodeId>> {
        let mut roots: Vec<NodeId> = self
            .read()?
            .nodes
            .values()
            .filter(|n| n.is_root)
            .map(|n| n.id.clone())
            .collect();
        roots.sort();
        Ok(roots)
    }

    async fn approved_adjacency(&self) -> StorageResult<Adjacency> {
        let state = self.read()?;
        let mut adjacency = Adjacency::new();
        let mut edges: Vec<&EdgeRecord> = state.edges.values().filter(|e| e.is_approved()).collect();
        edges.sort_by_key(|e| e.edge_id);
        for edge in edges {
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .push(edge.to.clone());
        }
        Ok(adjacency)
    }

    async fn apply_level_updates(&self, updates: &[LevelUpdate]) -> StorageResult<()> {
        let mut state = self.write()?;
        let levels: HashMap<&NodeId, u32> = updates
            .iter()
            .flat_map(|u| u.to_nodes.iter().map(move |n| (n, u.level)))
            .collect();
        for edge in state.edges.values_mut() {
            if let Some(level) = levels.get(&edge.to) {
                edge.level = Some(*level);
            }
        }
        Ok(())
    }

    async fn list_nodes(&self) -> StorageResult<Vec<NodeRecord>> {
        let mut nodes: Vec<NodeRecord> = self.read()?.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn list_edges(&self) -> StorageResult<Vec<EdgeRecord>> {
        let mut edges: Vec<EdgeRecord> = self.read()?.edges.values().cloned().collect();
        edges.sort_by_key(|e| e.edge_id);
        Ok(edges)
    }
}
