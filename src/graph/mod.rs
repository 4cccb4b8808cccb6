use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod builder;
pub mod error;
pub mod expand;
pub mod load;

pub use error::LoadError;
pub use expand::{ExpandRequest, Expansion, expand_neighborhood};
pub use load::{LoadRequest, load_neighborhood};

pub type NodeId = Uuid;

/// Workspace a query is resolved against. `None` spans every workspace.
pub type GraphScope = Option<Uuid>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Attribute,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Attribute => "attribute",
        }
    }
}

/// Typed identity of a vertex. Ordering is `(kind, id)`, so an entity always
/// sorts before an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub id: NodeId,
}

impl NodeKey {
    pub fn entity(id: NodeId) -> Self {
        Self {
            kind: NodeKind::Entity,
            id,
        }
    }

    pub fn attribute(id: NodeId) -> Self {
        Self {
            kind: NodeKind::Attribute,
            id,
        }
    }

    pub fn is_entity(&self) -> bool {
        self.kind == NodeKind::Entity
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.label(), self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphNode {
    pub key: NodeKey,
    pub label: String,
}

impl GraphNode {
    pub fn new(key: NodeKey, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    Link,
    Containment,
}

/// Undirected layout edge. Construction orders the endpoints so that two
/// edges over the same pair and kind compare equal whatever their direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphEdge {
    a: NodeKey,
    b: NodeKey,
    kind: EdgeKind,
}

impl GraphEdge {
    pub fn new(x: NodeKey, y: NodeKey, kind: EdgeKind) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self { a, b, kind }
    }

    pub fn a(&self) -> NodeKey {
        self.a
    }

    pub fn b(&self) -> NodeKey {
        self.b
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn touches(&self, key: &NodeKey) -> bool {
        self.a == *key || self.b == *key
    }

    pub fn other(&self, key: &NodeKey) -> Option<NodeKey> {
        if self.a == *key {
            Some(self.b)
        } else if self.b == *key {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn is_loop(&self) -> bool {
        self.a == self.b
    }
}

/// Direction-sensitive key used to attach a note to one direction of a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirectedEdgeKey {
    pub source: NodeKey,
    pub target: NodeKey,
    pub kind: EdgeKind,
}

impl DirectedEdgeKey {
    pub fn edge(&self) -> GraphEdge {
        GraphEdge::new(self.source, self.target, self.kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budgets {
    pub max_nodes: usize,
    pub max_links: usize,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_nodes: 220,
            max_links: 600,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub notes: BTreeMap<DirectedEdgeKey, String>,
    /// Set when a budget cut records that were otherwise reachable.
    pub truncated: bool,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.iter().any(|node| node.key == *key)
    }

    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.key == *key)
    }

    pub fn label_of(&self, key: &NodeKey) -> Option<&str> {
        self.node(key).map(|node| node.label.as_str())
    }

    pub fn keys(&self) -> HashSet<NodeKey> {
        self.nodes.iter().map(|node| node.key).collect()
    }

    pub fn labels(&self) -> HashMap<NodeKey, &str> {
        self.nodes
            .iter()
            .map(|node| (node.key, node.label.as_str()))
            .collect()
    }

    pub fn within(&self, budgets: Budgets) -> bool {
        self.nodes.len() <= budgets.max_nodes && self.edges.len() <= budgets.max_links
    }

    /// Owning entity of `key`, resolved through containment edges.
    pub fn owner_of(&self, key: &NodeKey) -> Option<NodeKey> {
        if key.is_entity() {
            return None;
        }

        self.edges
            .iter()
            .filter(|edge| edge.kind() == EdgeKind::Containment)
            .filter_map(|edge| edge.other(key))
            .find(NodeKey::is_entity)
    }

    pub fn note(&self, source: NodeKey, target: NodeKey) -> Option<&str> {
        self.notes
            .get(&DirectedEdgeKey {
                source,
                target,
                kind: EdgeKind::Link,
            })
            .map(String::as_str)
    }
}

/// Collapses logically equal edges, keeping the first occurrence in order.
pub fn unique_edges(edges: impl IntoIterator<Item = GraphEdge>) -> Vec<GraphEdge> {
    let mut seen = HashSet::new();
    edges
        .into_iter()
        .filter(|edge| seen.insert(*edge))
        .collect()
}
