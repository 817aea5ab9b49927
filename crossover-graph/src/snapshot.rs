//! Graph snapshot assembly.
//!
//! A snapshot is the read view around one root: every node within
//! [`MAX_SNAPSHOT_DEPTH`] hops, walking edges in both directions and
//! regardless of review state. Assembling it touches every edge, which is
//! why callers go through [`SnapshotAssembler::cached`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crossover_core::constants::MAX_SNAPSHOT_DEPTH;
use crossover_core::{Clock, CrossoverResult, EdgeRecord, NodeId, NodeRecord, Timestamp};
use crossover_storage::{CacheRead, VersionedSnapshotCache};
use serde::{Deserialize, Serialize};

use crate::store::GraphStore;

/// Node as shown in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub title: String,
    pub kind: String,
    pub is_root: bool,
    pub cover_url: Option<String>,
    /// Hops from the snapshot root.
    pub level: u32,
}

impl SnapshotNode {
    fn from_record(record: &NodeRecord, level: u32) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            kind: record.kind.clone(),
            is_root: record.is_root,
            cover_url: record.cover_url.clone(),
            level,
        }
    }
}

/// Edge as shown in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLink {
    pub source: NodeId,
    pub target: NodeId,
    pub relation: String,
    pub level: u32,
    /// No approved evidence yet.
    pub is_unreviewed: bool,
}

impl SnapshotLink {
    fn from_record(edge: &EdgeRecord, level: u32) -> Self {
        Self {
            source: edge.from.clone(),
            target: edge.to.clone(),
            relation: edge.kind.clone(),
            level,
            is_unreviewed: !edge.is_approved(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub links: Vec<SnapshotLink>,
    pub cached_at: Timestamp,
}

impl GraphSnapshot {
    pub fn empty(cached_at: Timestamp) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            cached_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&SnapshotNode> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }
}

/// Builds [`GraphSnapshot`]s from a [`GraphStore`].
#[derive(Clone)]
pub struct SnapshotAssembler {
    store: Arc<dyn GraphStore>,
    clock: Arc<dyn Clock>,
}

impl SnapshotAssembler {
    pub fn new(store: Arc<dyn GraphStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn now(&self) -> Timestamp {
        Timestamp::from_timestamp_millis(self.clock.now_ms()).unwrap_or_default()
    }

    /// Assemble the snapshot around `root`. An unknown root yields an
    /// empty snapshot.
    pub async fn assemble(&self, root: &NodeId) -> CrossoverResult<GraphSnapshot> {
        let nodes: HashMap<NodeId, NodeRecord> = self
            .store
            .list_nodes()
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        let Some(root_record) = nodes.get(root) else {
            tracing::debug!(root = %root, "Snapshot requested for unknown root");
            return Ok(GraphSnapshot::empty(self.now()));
        };

        let edges = self.store.list_edges().await?;
        let mut outgoing: HashMap<&NodeId, Vec<&EdgeRecord>> = HashMap::new();
        let mut incoming: HashMap<&NodeId, Vec<&EdgeRecord>> = HashMap::new();
        for edge in &edges {
            outgoing.entry(&edge.from).or_default().push(edge);
            incoming.entry(&edge.to).or_default().push(edge);
        }

        let mut root_node = SnapshotNode::from_record(root_record, 0);
        root_node.is_root = true;

        let mut snapshot_nodes = vec![root_node];
        let mut links = Vec::new();
        let mut visited: HashSet<&NodeId> = HashSet::from([root]);
        let mut linked: HashSet<(&NodeId, &NodeId)> = HashSet::new();
        let mut queue: VecDeque<(&NodeId, u32)> = VecDeque::from([(root, 0)]);

        while let Some((current, level)) = queue.pop_front() {
            if level >= MAX_SNAPSHOT_DEPTH {
                continue;
            }

            let out = outgoing
                .get(current)
                .into_iter()
                .flatten()
                .map(|&edge| (edge, &edge.to));
            let inc = incoming
                .get(current)
                .into_iter()
                .flatten()
                .map(|&edge| (edge, &edge.from));

            for (edge, neighbour) in out.chain(inc) {
                let Some(record) = nodes.get(neighbour) else {
                    continue;
                };
                if linked.insert((&edge.from, &edge.to)) {
                    links.push(SnapshotLink::from_record(edge, level + 1));
                }
                if visited.insert(neighbour) {
                    snapshot_nodes.push(SnapshotNode::from_record(record, level + 1));
                    queue.push_back((neighbour, level + 1));
                }
            }
        }

        tracing::debug!(
            root = %root,
            nodes = snapshot_nodes.len(),
            links = links.len(),
            "Graph snapshot assembled"
        );
        Ok(GraphSnapshot {
            nodes: snapshot_nodes,
            links,
            cached_at: self.now(),
        })
    }

    /// Snapshot for `root` through the versioned cache, keyed by root id.
    pub async fn cached(
        &self,
        cache: &VersionedSnapshotCache<GraphSnapshot>,
        root: &NodeId,
    ) -> CrossoverResult<CacheRead<GraphSnapshot>> {
        cache
            .get_or_compute_default(root.as_str(), || self.assemble(root))
            .await
    }
}

impl std::fmt::Debug for SnapshotAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotAssembler").finish_non_exhaustive()
    }
}
