mod memory;
mod notebook;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::graph::{DirectedEdgeKey, EdgeKind, GraphEdge, GraphScope, NodeId, NodeKey, NodeKind};

pub use memory::MemoryStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: NodeId,
    pub label: String,
    /// Owning entity, set for attributes only.
    pub owner: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: Uuid,
    pub source: NodeKey,
    pub target: NodeKey,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LinkRecord {
    pub fn edge(&self) -> GraphEdge {
        GraphEdge::new(self.source, self.target, EdgeKind::Link)
    }

    pub fn directed_key(&self) -> DirectedEdgeKey {
        DirectedEdgeKey {
            source: self.source,
            target: self.target,
            kind: EdgeKind::Link,
        }
    }

    /// Far endpoint as seen from `key`; `None` for self-links and unrelated keys.
    pub fn peer_of(&self, key: &NodeKey) -> Option<NodeKey> {
        if self.source == self.target {
            None
        } else if self.source == *key {
            Some(self.target)
        } else if self.target == *key {
            Some(self.source)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("graph store is unavailable")]
    Unavailable,
    #[error("store query failed: {0}")]
    Query(String),
}

/// Read-only access to the notebook. Every query takes an explicit limit and
/// resolves workspace scoping itself, legacy unscoped records included.
pub trait GraphStore: Send + Sync {
    /// Nodes of one kind, sorted by label, optionally narrowed to labels that
    /// start with `search_prefix` (case-insensitive).
    fn fetch_nodes(
        &self,
        scope: GraphScope,
        kind: NodeKind,
        limit: usize,
        search_prefix: Option<&str>,
    ) -> Result<Vec<NodeSummary>, StoreError>;

    /// Links filtered by endpoint, ordered by creation time.
    fn fetch_links(
        &self,
        scope: GraphScope,
        source: Option<NodeKey>,
        target: Option<NodeKey>,
        limit: usize,
    ) -> Result<Vec<LinkRecord>, StoreError>;

    fn fetch_node_by_id(&self, kind: NodeKind, id: NodeId)
    -> Result<Option<NodeSummary>, StoreError>;

    /// Attribute children of `owner`, sorted by label.
    fn fetch_attributes(
        &self,
        scope: GraphScope,
        owner: NodeId,
        limit: usize,
    ) -> Result<Vec<NodeSummary>, StoreError>;
}

/// Two-tier scope resolution: a record belongs to scope `g` when it was
/// written to `g` or predates workspaces and carries none.
pub fn scope_matches(record_graph: Option<Uuid>, scope: GraphScope) -> bool {
    match scope {
        None => true,
        Some(graph) => record_graph.is_none_or(|record| record == graph),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_records_match_every_scope() {
        let graph = Uuid::from_u128(10);
        let other = Uuid::from_u128(11);

        assert!(scope_matches(None, Some(graph)));
        assert!(scope_matches(Some(graph), Some(graph)));
        assert!(!scope_matches(Some(other), Some(graph)));
        assert!(scope_matches(Some(other), None));
    }

    #[test]
    fn self_links_have_no_peer() {
        let node = NodeKey::entity(Uuid::from_u128(1));
        let link = LinkRecord {
            id: Uuid::from_u128(2),
            source: node,
            target: node,
            note: None,
            created_at: Utc::now(),
        };

        assert_eq!(link.peer_of(&node), None);
    }
}
