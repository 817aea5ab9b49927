//! Graph records: nodes, edges and the evidence that approves them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Edge identifier (UUIDv7, timestamp-sortable).
pub type EdgeId = Uuid;

/// Evidence identifier (UUIDv7, timestamp-sortable).
pub type EvidenceId = Uuid;

/// Shortest hop count from the nearest root, per node.
pub type LevelMap = HashMap<NodeId, u32>;

/// Review state of a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl EvidenceStatus {
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// A node in the tracked graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub title: String,
    pub kind: String,
    pub is_root: bool,
    pub cover_url: Option<String>,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: kind.into(),
            is_root: false,
            cover_url: None,
        }
    }

    pub fn root(mut self) -> Self {
        self.is_root = true;
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }
}

/// A single evidence record attached to an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub evidence_id: EvidenceId,
    pub status: EvidenceStatus,
}

impl EvidenceRecord {
    pub fn new(status: EvidenceStatus) -> Self {
        Self {
            evidence_id: Uuid::now_v7(),
            status,
        }
    }
}

/// Directed edge `from -> to`, unique per `(from, to, kind)`.
///
/// `level` is owned by the level engine. `None` means it has never been
/// computed; a stale value survives when the destination becomes unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub edge_id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: String,
    pub level: Option<u32>,
    pub evidence: Vec<EvidenceRecord>,
}

impl EdgeRecord {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            edge_id: Uuid::now_v7(),
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            level: None,
            evidence: Vec::new(),
        }
    }

    /// An edge is approved iff at least one evidence record is approved.
    pub fn is_approved(&self) -> bool {
        self.evidence.iter().any(|e| e.status.is_approved())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_approval_requires_one_approved_evidence() {
        let mut edge = EdgeRecord::new("a", "b", "adaptation");
        assert!(!edge.is_approved());

        edge.evidence.push(EvidenceRecord::new(EvidenceStatus::Pending));
        edge.evidence.push(EvidenceRecord::new(EvidenceStatus::Rejected));
        assert!(!edge.is_approved());

        edge.evidence.push(EvidenceRecord::new(EvidenceStatus::Approved));
        assert!(edge.is_approved());
    }

    #[test]
    fn test_evidence_status_serializes_uppercase() {
        let json = serde_json::to_string(&EvidenceStatus::Approved).unwrap();
        assert_eq!(json, "\"APPROVED\"");
        let parsed: EvidenceStatus = serde_json::from_str("\"REJECTED\"").unwrap();
        assert_eq!(parsed, EvidenceStatus::Rejected);
    }

    #[test]
    fn test_node_id_is_transparent() {
        let id = NodeId::from("work-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"work-1\"");
        assert_eq!(id.to_string(), "work-1");
    }
}
