use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use super::{Budgets, DirectedEdgeKey, GraphEdge, GraphNode, GraphSnapshot, NodeKey};
use crate::store::LinkRecord;

/// Accumulates nodes and edges under a pair of hard budgets.
pub(super) struct SnapshotBuilder {
    budgets: Budgets,
    nodes: Vec<GraphNode>,
    present: HashSet<NodeKey>,
    edges: Vec<GraphEdge>,
    edge_set: HashSet<GraphEdge>,
    notes: BTreeMap<DirectedEdgeKey, String>,
    truncated: bool,
}

impl SnapshotBuilder {
    pub(super) fn new(budgets: Budgets) -> Self {
        Self {
            budgets,
            nodes: Vec::new(),
            present: HashSet::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
            notes: BTreeMap::new(),
            truncated: false,
        }
    }

    pub(super) fn from_snapshot(snapshot: &GraphSnapshot, budgets: Budgets) -> Self {
        let mut builder = Self::new(budgets);
        builder.present = snapshot.keys();
        builder.nodes = snapshot.nodes.clone();
        for edge in &snapshot.edges {
            if builder.edge_set.insert(*edge) {
                builder.edges.push(*edge);
            }
        }
        builder.notes = snapshot.notes.clone();
        builder.truncated = snapshot.truncated;
        builder
    }

    pub(super) fn contains(&self, key: &NodeKey) -> bool {
        self.present.contains(key)
    }

    pub(super) fn contains_edge(&self, edge: &GraphEdge) -> bool {
        self.edge_set.contains(edge)
    }

    pub(super) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(super) fn node_keys(&self) -> Vec<NodeKey> {
        self.nodes.iter().map(|node| node.key).collect()
    }

    pub(super) fn remaining_nodes(&self) -> usize {
        self.budgets.max_nodes.saturating_sub(self.nodes.len())
    }

    pub(super) fn remaining_links(&self) -> usize {
        self.budgets.max_links.saturating_sub(self.edges.len())
    }

    pub(super) fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Adds a node unless the node budget is spent. Returns whether the node
    /// is part of the snapshot afterwards.
    pub(super) fn admit(&mut self, node: GraphNode) -> bool {
        if self.present.contains(&node.key) {
            return true;
        }
        if self.remaining_nodes() == 0 {
            self.truncated = true;
            return false;
        }

        self.present.insert(node.key);
        self.nodes.push(node);
        true
    }

    /// Adds an edge between two admitted nodes. Returns `true` only when the
    /// edge is new.
    pub(super) fn push_edge(&mut self, edge: GraphEdge) -> bool {
        if edge.is_loop() || !self.contains(&edge.a()) || !self.contains(&edge.b()) {
            return false;
        }
        if self.edge_set.contains(&edge) {
            return false;
        }
        if self.remaining_links() == 0 {
            self.truncated = true;
            return false;
        }

        self.edge_set.insert(edge);
        self.edges.push(edge);
        true
    }

    pub(super) fn push_link(&mut self, link: &LinkRecord) -> bool {
        let edge = link.edge();
        let added = self.push_edge(edge);

        if let Some(note) = &link.note
            && self.edge_set.contains(&edge)
        {
            self.notes
                .entry(link.directed_key())
                .or_insert_with(|| note.clone());
        }

        added
    }

    /// Enforces both budgets one final time and drops anything dangling.
    pub(super) fn finish(mut self) -> GraphSnapshot {
        if self.nodes.len() > self.budgets.max_nodes {
            self.nodes.truncate(self.budgets.max_nodes);
            self.truncated = true;
        }

        let kept = self.nodes.iter().map(|node| node.key).collect::<HashSet<_>>();
        self.edges
            .retain(|edge| kept.contains(&edge.a()) && kept.contains(&edge.b()));
        if self.edges.len() > self.budgets.max_links {
            self.edges.truncate(self.budgets.max_links);
            self.truncated = true;
        }

        let edge_set = self.edges.iter().copied().collect::<HashSet<_>>();
        self.notes.retain(|key, _| edge_set.contains(&key.edge()));

        GraphSnapshot {
            nodes: self.nodes,
            edges: self.edges,
            notes: self.notes,
            truncated: self.truncated,
        }
    }
}

/// Case-insensitive label order with the key as tiebreaker.
pub(super) fn label_order(a: &GraphNode, b: &GraphNode) -> Ordering {
    a.label
        .to_lowercase()
        .cmp(&b.label.to_lowercase())
        .then_with(|| a.key.cmp(&b.key))
}
