use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::{GraphStore, LinkRecord, NodeSummary, StoreError, scope_matches};
use crate::graph::{GraphScope, NodeId, NodeKey, NodeKind};

#[derive(Clone, Debug)]
struct StoredNode {
    summary: NodeSummary,
    graph: Option<Uuid>,
}

#[derive(Clone, Debug)]
struct StoredLink {
    record: LinkRecord,
    graph: Option<Uuid>,
}

/// Store kept entirely in memory; backs the viewer and the test fixtures.
#[derive(Debug)]
pub struct MemoryStore {
    entities: Vec<StoredNode>,
    attributes: Vec<StoredNode>,
    links: Vec<StoredLink>,
    clock: DateTime<Utc>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            attributes: Vec::new(),
            links: Vec::new(),
            clock: Utc::now(),
            available: AtomicBool::new(true),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Simulates the backing database going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn add_entity(&mut self, label: &str) -> NodeKey {
        self.insert_entity(Uuid::new_v4(), label, None)
    }

    pub fn add_attribute(&mut self, owner: NodeKey, label: &str) -> NodeKey {
        self.insert_attribute(Uuid::new_v4(), owner.id, label, None)
    }

    pub fn add_link(&mut self, source: NodeKey, target: NodeKey) -> Uuid {
        self.insert_link(Uuid::new_v4(), source, target, None, None, None)
    }

    pub fn add_link_with_note(&mut self, source: NodeKey, target: NodeKey, note: &str) -> Uuid {
        self.insert_link(
            Uuid::new_v4(),
            source,
            target,
            Some(note.to_owned()),
            None,
            None,
        )
    }

    pub fn insert_entity(&mut self, id: NodeId, label: &str, graph: Option<Uuid>) -> NodeKey {
        self.entities.push(StoredNode {
            summary: NodeSummary {
                id,
                label: label.to_owned(),
                owner: None,
            },
            graph,
        });
        NodeKey::entity(id)
    }

    pub fn insert_attribute(
        &mut self,
        id: NodeId,
        owner: NodeId,
        label: &str,
        graph: Option<Uuid>,
    ) -> NodeKey {
        self.attributes.push(StoredNode {
            summary: NodeSummary {
                id,
                label: label.to_owned(),
                owner: Some(owner),
            },
            graph,
        });
        NodeKey::attribute(id)
    }

    /// Links without an explicit timestamp are stamped from a monotonic clock
    /// so that insertion order is also creation order.
    pub fn insert_link(
        &mut self,
        id: Uuid,
        source: NodeKey,
        target: NodeKey,
        note: Option<String>,
        created_at: Option<DateTime<Utc>>,
        graph: Option<Uuid>,
    ) -> Uuid {
        let created_at = created_at.unwrap_or_else(|| {
            self.clock += TimeDelta::milliseconds(1);
            self.clock
        });

        self.links.push(StoredLink {
            record: LinkRecord {
                id,
                source,
                target,
                note,
                created_at,
            },
            graph,
        });
        id
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn table(&self, kind: NodeKind) -> &[StoredNode] {
        match kind {
            NodeKind::Entity => &self.entities,
            NodeKind::Attribute => &self.attributes,
        }
    }
}

fn sorted_summaries<'a>(
    nodes: impl Iterator<Item = &'a StoredNode>,
    limit: usize,
) -> Vec<NodeSummary> {
    let mut summaries = nodes.map(|node| node.summary.clone()).collect::<Vec<_>>();
    summaries.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    summaries.truncate(limit);
    summaries
}

impl GraphStore for MemoryStore {
    fn fetch_nodes(
        &self,
        scope: GraphScope,
        kind: NodeKind,
        limit: usize,
        search_prefix: Option<&str>,
    ) -> Result<Vec<NodeSummary>, StoreError> {
        self.ensure_available()?;

        let prefix = search_prefix
            .map(|prefix| prefix.trim().to_lowercase())
            .filter(|prefix| !prefix.is_empty());

        Ok(sorted_summaries(
            self.table(kind).iter().filter(|node| {
                scope_matches(node.graph, scope)
                    && prefix.as_ref().is_none_or(|prefix| {
                        node.summary.label.to_lowercase().starts_with(prefix.as_str())
                    })
            }),
            limit,
        ))
    }

    fn fetch_links(
        &self,
        scope: GraphScope,
        source: Option<NodeKey>,
        target: Option<NodeKey>,
        limit: usize,
    ) -> Result<Vec<LinkRecord>, StoreError> {
        self.ensure_available()?;

        let mut links = self
            .links
            .iter()
            .filter(|link| {
                scope_matches(link.graph, scope)
                    && source.is_none_or(|source| link.record.source == source)
                    && target.is_none_or(|target| link.record.target == target)
            })
            .map(|link| link.record.clone())
            .collect::<Vec<_>>();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        links.truncate(limit);
        Ok(links)
    }

    fn fetch_node_by_id(
        &self,
        kind: NodeKind,
        id: NodeId,
    ) -> Result<Option<NodeSummary>, StoreError> {
        self.ensure_available()?;

        Ok(self
            .table(kind)
            .iter()
            .find(|node| node.summary.id == id)
            .map(|node| node.summary.clone()))
    }

    fn fetch_attributes(
        &self,
        scope: GraphScope,
        owner: NodeId,
        limit: usize,
    ) -> Result<Vec<NodeSummary>, StoreError> {
        self.ensure_available()?;

        Ok(sorted_summaries(
            self.attributes.iter().filter(|node| {
                node.summary.owner == Some(owner) && scope_matches(node.graph, scope)
            }),
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetches_respect_limits_and_label_order() {
        let mut store = MemoryStore::new();
        store.add_entity("delta");
        store.add_entity("Alpha");
        store.add_entity("charlie");
        store.add_entity("bravo");

        let nodes = store
            .fetch_nodes(None, NodeKind::Entity, 3, None)
            .expect("fetch");
        let labels = nodes.iter().map(|n| n.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Alpha", "bravo", "charlie"]);

        let prefixed = store
            .fetch_nodes(None, NodeKind::Entity, 10, Some("CH"))
            .expect("fetch");
        assert_eq!(prefixed.len(), 1);
        assert_eq!(prefixed[0].label, "charlie");
    }

    #[test]
    fn links_filter_by_endpoint_in_creation_order() {
        let mut store = MemoryStore::new();
        let a = store.add_entity("a");
        let b = store.add_entity("b");
        let c = store.add_entity("c");
        let first = store.add_link(a, b);
        let second = store.add_link(a, c);
        store.add_link(b, c);

        let outgoing = store.fetch_links(None, Some(a), None, 10).expect("fetch");
        assert_eq!(
            outgoing.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![first, second]
        );

        let incoming = store.fetch_links(None, None, Some(c), 1).expect("fetch");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, second);
    }

    #[test]
    fn scoped_queries_include_legacy_records() {
        let graph = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut store = MemoryStore::new();
        store.insert_entity(Uuid::new_v4(), "scoped", Some(graph));
        store.insert_entity(Uuid::new_v4(), "legacy", None);
        store.insert_entity(Uuid::new_v4(), "foreign", Some(other));

        let nodes = store
            .fetch_nodes(Some(graph), NodeKind::Entity, 10, None)
            .expect("fetch");
        let labels = nodes.iter().map(|n| n.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["legacy", "scoped"]);
    }

    #[test]
    fn unavailable_store_fails_every_query() {
        let mut store = MemoryStore::new();
        let a = store.add_entity("a");
        store.set_available(false);

        assert_eq!(
            store.fetch_node_by_id(NodeKind::Entity, a.id),
            Err(StoreError::Unavailable)
        );
        store.set_available(true);
        assert!(store.fetch_node_by_id(NodeKind::Entity, a.id).is_ok());
    }
}
