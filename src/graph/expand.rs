use super::builder::{SnapshotBuilder, label_order};
use super::{
    Budgets, EdgeKind, GraphEdge, GraphNode, GraphScope, GraphSnapshot, LoadError, NodeKey,
    NodeKind,
};
use crate::store::GraphStore;

const EXPAND_MIN_PER_DIRECTION: usize = 40;
const EXPAND_MAX_PER_DIRECTION: usize = 220;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandRequest {
    pub scope: GraphScope,
    pub around: NodeKey,
    pub include_attributes: bool,
    pub budgets: Budgets,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expansion {
    pub snapshot: GraphSnapshot,
    /// Nodes that were not in the base snapshot, in admission order.
    pub admitted: Vec<NodeKey>,
}

impl Expansion {
    /// Nothing new is admitted, but the base is still cut down to `budgets`
    /// in case it was loaded under larger ones.
    fn unchanged(base: &GraphSnapshot, budgets: Budgets) -> Self {
        Self {
            snapshot: SnapshotBuilder::from_snapshot(base, budgets).finish(),
            admitted: Vec::new(),
        }
    }
}

/// Per-direction link limit for one expansion call.
pub fn per_direction_limit(max_links: usize) -> usize {
    (max_links / 6).clamp(EXPAND_MIN_PER_DIRECTION, EXPAND_MAX_PER_DIRECTION)
}

pub fn expand_neighborhood(
    store: &dyn GraphStore,
    base: &GraphSnapshot,
    request: &ExpandRequest,
) -> Result<Expansion, LoadError> {
    let budgets = request.budgets;
    let around = request.around;
    if base.node_count() >= budgets.max_nodes || !base.contains(&around) {
        return Ok(Expansion::unchanged(base, budgets));
    }

    let mut builder = SnapshotBuilder::from_snapshot(base, budgets);
    let mut admitted = Vec::new();
    let limit = per_direction_limit(budgets.max_links);

    let outgoing = store.fetch_links(request.scope, Some(around), None, limit)?;
    let incoming = store.fetch_links(request.scope, None, Some(around), limit)?;

    for link in outgoing.iter().chain(incoming.iter()) {
        let Some(peer) = link.peer_of(&around) else {
            continue;
        };

        if !builder.contains(&peer) {
            if builder.remaining_nodes() == 0 {
                builder.mark_truncated();
                continue;
            }
            let Some(summary) = store.fetch_node_by_id(peer.kind, peer.id)? else {
                continue;
            };
            builder.admit(GraphNode::new(peer, summary.label));
            admitted.push(peer);
        }

        builder.push_link(link);
    }

    if request.include_attributes {
        match around.kind {
            NodeKind::Entity => {
                attach_children(store, request, &mut builder, &mut admitted)?;
            }
            NodeKind::Attribute => {
                attach_owner(store, request, &mut builder, &mut admitted)?;
            }
        }
    }

    let snapshot = builder.finish();
    admitted.retain(|key| snapshot.contains(key));
    tracing::debug!(
        %around,
        admitted = admitted.len(),
        nodes = snapshot.node_count(),
        edges = snapshot.edge_count(),
        "neighborhood expanded"
    );

    Ok(Expansion { snapshot, admitted })
}

fn attach_children(
    store: &dyn GraphStore,
    request: &ExpandRequest,
    builder: &mut SnapshotBuilder,
    admitted: &mut Vec<NodeKey>,
) -> Result<(), LoadError> {
    let around = request.around;
    let limit = per_direction_limit(request.budgets.max_links);
    let mut children = store
        .fetch_attributes(request.scope, around.id, limit)?
        .into_iter()
        .map(|summary| GraphNode::new(NodeKey::attribute(summary.id), summary.label))
        .collect::<Vec<_>>();
    children.sort_by(label_order);

    for child in children {
        let key = child.key;
        let is_new = !builder.contains(&key);
        if !builder.admit(child) {
            continue;
        }
        if is_new {
            admitted.push(key);
        }
        builder.push_edge(GraphEdge::new(around, key, EdgeKind::Containment));
    }

    Ok(())
}

fn attach_owner(
    store: &dyn GraphStore,
    request: &ExpandRequest,
    builder: &mut SnapshotBuilder,
    admitted: &mut Vec<NodeKey>,
) -> Result<(), LoadError> {
    let around = request.around;
    let Some(owner_id) = store
        .fetch_node_by_id(NodeKind::Attribute, around.id)?
        .and_then(|summary| summary.owner)
    else {
        return Ok(());
    };

    let owner = NodeKey::entity(owner_id);
    if !builder.contains(&owner) {
        let Some(summary) = store.fetch_node_by_id(NodeKind::Entity, owner_id)? else {
            return Ok(());
        };
        if !builder.admit(GraphNode::new(owner, summary.label)) {
            return Ok(());
        }
        admitted.push(owner);
    }

    builder.push_edge(GraphEdge::new(owner, around, EdgeKind::Containment));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::load::{LoadRequest, load_neighborhood};
    use crate::store::MemoryStore;

    fn budgets(max_nodes: usize, max_links: usize) -> Budgets {
        Budgets {
            max_nodes,
            max_links,
        }
    }

    fn expand_request(around: NodeKey, budgets: Budgets) -> ExpandRequest {
        ExpandRequest {
            scope: None,
            around,
            include_attributes: false,
            budgets,
        }
    }

    fn focus_snapshot(store: &MemoryStore, focus: NodeKey, budgets: Budgets) -> GraphSnapshot {
        load_neighborhood(
            store,
            &LoadRequest {
                scope: None,
                focus: Some(focus),
                hops: 1,
                include_attributes: false,
                budgets,
            },
        )
        .expect("load")
    }

    #[test]
    fn per_direction_limit_is_clamped() {
        assert_eq!(per_direction_limit(60), 40);
        assert_eq!(per_direction_limit(600), 100);
        assert_eq!(per_direction_limit(60_000), 220);
    }

    #[test]
    fn expansion_appends_new_neighbors() {
        let mut store = MemoryStore::new();
        let a = store.add_entity("A");
        let b = store.add_entity("B");
        let c = store.add_entity("C");
        let d = store.add_entity("D");
        store.add_link(a, b);
        store.add_link(b, c);
        store.add_link(d, b);

        let budgets = budgets(50, 50);
        let base = focus_snapshot(&store, a, budgets);
        assert_eq!(base.node_count(), 2);

        let expansion =
            expand_neighborhood(&store, &base, &expand_request(b, budgets)).expect("expand");
        assert_eq!(expansion.admitted, vec![c, d]);
        assert_eq!(&expansion.snapshot.nodes[..2], &base.nodes[..]);
        assert_eq!(expansion.snapshot.edge_count(), 3);
        assert_eq!(expansion.snapshot.edges[0], base.edges[0]);
    }

    #[test]
    fn rejected_peers_take_their_edges_with_them() {
        let mut store = MemoryStore::new();
        let hub = store.add_entity("hub");
        let leaves = (0..10)
            .map(|index| store.add_entity(&format!("leaf {index}")))
            .collect::<Vec<_>>();
        for leaf in &leaves {
            store.add_link(hub, *leaf);
        }

        let base = GraphSnapshot {
            nodes: vec![GraphNode::new(hub, "hub")],
            ..GraphSnapshot::default()
        };
        let budgets = budgets(4, 100);
        let expansion =
            expand_neighborhood(&store, &base, &expand_request(hub, budgets)).expect("expand");

        assert_eq!(expansion.admitted, leaves[..3].to_vec());
        assert_eq!(expansion.snapshot.node_count(), 4);
        assert_eq!(expansion.snapshot.edge_count(), 3);
        assert!(expansion.snapshot.truncated);
        assert!(expansion.snapshot.within(budgets));
    }

    #[test]
    fn full_snapshot_is_left_alone() {
        let mut store = MemoryStore::new();
        let a = store.add_entity("A");
        let b = store.add_entity("B");
        let c = store.add_entity("C");
        store.add_link(a, b);
        store.add_link(b, c);

        let budgets = budgets(2, 10);
        let base = focus_snapshot(&store, a, budgets);
        let expansion =
            expand_neighborhood(&store, &base, &expand_request(b, budgets)).expect("expand");

        assert_eq!(expansion.snapshot, base);
        assert!(expansion.admitted.is_empty());
    }

    #[test]
    fn oversized_base_is_cut_down_to_the_budgets() {
        let mut store = MemoryStore::new();
        let hub = store.add_entity("hub");
        for index in 0..8 {
            let leaf = store.add_entity(&format!("leaf {index}"));
            store.add_link(hub, leaf);
        }

        let base = focus_snapshot(&store, hub, budgets(50, 50));
        assert_eq!(base.node_count(), 9);
        assert_eq!(base.edge_count(), 8);

        let small = budgets(3, 2);
        let expansion =
            expand_neighborhood(&store, &base, &expand_request(hub, small)).expect("expand");

        assert!(expansion.snapshot.within(small));
        assert!(expansion.snapshot.truncated);
        assert!(expansion.admitted.is_empty());
        assert_eq!(&expansion.snapshot.nodes[..], &base.nodes[..3]);
        for edge in &expansion.snapshot.edges {
            assert!(expansion.snapshot.contains(&edge.a()));
            assert!(expansion.snapshot.contains(&edge.b()));
        }
    }

    #[test]
    fn edge_budget_keeps_existing_edges_first() {
        let mut store = MemoryStore::new();
        let a = store.add_entity("A");
        let b = store.add_entity("B");
        let c = store.add_entity("C");
        store.add_link(a, b);
        store.add_link(b, c);
        store.add_link(a, c);

        let budgets = budgets(10, 2);
        let base = focus_snapshot(&store, a, budgets);
        assert_eq!(base.edge_count(), 2);

        let expansion =
            expand_neighborhood(&store, &base, &expand_request(b, budgets)).expect("expand");
        assert_eq!(expansion.snapshot.edges, base.edges);
        assert!(expansion.snapshot.within(budgets));
    }

    #[test]
    fn attributes_pull_in_children_and_owners() {
        let mut store = MemoryStore::new();
        let person = store.add_entity("Person");
        let age = store.add_attribute(person, "age");
        let name = store.add_attribute(person, "name");

        let base = GraphSnapshot {
            nodes: vec![GraphNode::new(person, "Person")],
            ..GraphSnapshot::default()
        };
        let request = ExpandRequest {
            include_attributes: true,
            ..expand_request(person, budgets(10, 10))
        };
        let expansion = expand_neighborhood(&store, &base, &request).expect("expand");
        assert_eq!(expansion.admitted, vec![age, name]);
        assert_eq!(expansion.snapshot.owner_of(&name), Some(person));

        let lone_attribute = GraphSnapshot {
            nodes: vec![GraphNode::new(age, "age")],
            ..GraphSnapshot::default()
        };
        let request = ExpandRequest {
            include_attributes: true,
            ..expand_request(age, budgets(10, 10))
        };
        let expansion = expand_neighborhood(&store, &lone_attribute, &request).expect("expand");
        assert_eq!(expansion.admitted, vec![person]);
        assert_eq!(
            expansion.snapshot.edges,
            vec![GraphEdge::new(person, age, EdgeKind::Containment)]
        );
    }

    #[test]
    fn failures_leave_the_base_untouched() {
        let mut store = MemoryStore::new();
        let a = store.add_entity("A");
        let base = GraphSnapshot {
            nodes: vec![GraphNode::new(a, "A")],
            ..GraphSnapshot::default()
        };
        store.set_available(false);

        let result = expand_neighborhood(&store, &base, &expand_request(a, budgets(5, 5)));
        assert_eq!(result, Err(LoadError::StoreUnavailable));
        assert_eq!(base.node_count(), 1);
    }
}
