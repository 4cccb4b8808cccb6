use std::collections::{HashMap, HashSet};

use super::builder::{SnapshotBuilder, label_order};
use super::{
    Budgets, EdgeKind, GraphEdge, GraphNode, GraphScope, GraphSnapshot, LoadError, NodeId,
    NodeKey, NodeKind,
};
use crate::store::{GraphStore, LinkRecord};

/// Floor of the per-node share when topping up the edge budget.
pub const FILL_MIN_PER_NODE: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub scope: GraphScope,
    pub focus: Option<NodeKey>,
    pub hops: usize,
    pub include_attributes: bool,
    pub budgets: Budgets,
}

pub fn load_neighborhood(
    store: &dyn GraphStore,
    request: &LoadRequest,
) -> Result<GraphSnapshot, LoadError> {
    let (mut builder, owners) = match request.focus {
        Some(focus) => traverse(store, request, focus)?,
        None => (global_slice(store, request)?, HashMap::new()),
    };

    if request.include_attributes && builder.node_count() > 0 {
        attach_attributes(store, request, &mut builder, &owners)?;
        fill_links(store, request, &mut builder)?;
    }

    let snapshot = builder.finish();
    if snapshot.truncated {
        tracing::debug!(
            max_nodes = request.budgets.max_nodes,
            max_links = request.budgets.max_links,
            "neighborhood truncated by budget"
        );
    }
    tracing::debug!(
        focus = ?request.focus,
        hops = request.hops,
        nodes = snapshot.node_count(),
        edges = snapshot.edge_count(),
        "neighborhood loaded"
    );
    Ok(snapshot)
}

/// Per-node cap on extra links while topping up the remaining edge budget.
pub fn fair_share(remaining: usize, node_count: usize) -> usize {
    (remaining / node_count.max(1)).max(FILL_MIN_PER_NODE)
}

fn global_slice(
    store: &dyn GraphStore,
    request: &LoadRequest,
) -> Result<SnapshotBuilder, LoadError> {
    let budgets = request.budgets;
    let mut builder = SnapshotBuilder::new(budgets);

    let mut nodes = store
        .fetch_nodes(request.scope, NodeKind::Entity, budgets.max_nodes, None)?
        .into_iter()
        .map(|summary| GraphNode::new(NodeKey::entity(summary.id), summary.label))
        .collect::<Vec<_>>();
    nodes.sort_by(label_order);
    for node in nodes {
        builder.admit(node);
    }

    let keys = builder.node_keys();
    for &key in &keys {
        if builder.remaining_links() == 0 {
            break;
        }

        let outgoing = store.fetch_links(request.scope, Some(key), None, budgets.max_links)?;
        let saturated = outgoing.len() >= budgets.max_links;
        for link in &outgoing {
            builder.push_link(link);
        }
        if !saturated {
            continue;
        }

        // Links leaving the slice may have filled the query, so ask for each
        // in-slice pair directly.
        for &peer in &keys {
            if builder.remaining_links() == 0 {
                break;
            }
            if peer == key || builder.contains_edge(&GraphEdge::new(key, peer, EdgeKind::Link)) {
                continue;
            }
            for link in store.fetch_links(request.scope, Some(key), Some(peer), 1)? {
                builder.push_link(&link);
            }
        }
    }

    Ok(builder)
}

fn traverse(
    store: &dyn GraphStore,
    request: &LoadRequest,
    focus: NodeKey,
) -> Result<(SnapshotBuilder, HashMap<NodeKey, NodeId>), LoadError> {
    let budgets = request.budgets;
    let mut builder = SnapshotBuilder::new(budgets);
    let mut owners = HashMap::new();

    let Some(root) = store.fetch_node_by_id(focus.kind, focus.id)? else {
        tracing::debug!(%focus, "focus node is not in the store");
        return Ok((builder, owners));
    };
    if budgets.max_nodes == 0 {
        builder.mark_truncated();
        return Ok((builder, owners));
    }

    let mut visited = vec![focus];
    let mut seen = HashSet::from([focus]);
    let mut links: Vec<LinkRecord> = Vec::new();
    let mut link_edges = HashSet::new();
    let mut links_truncated = false;
    let mut frontier = vec![focus];

    'rounds: for _ in 0..request.hops {
        if frontier.is_empty() || visited.len() >= budgets.max_nodes {
            break;
        }

        let mut next = Vec::new();
        for key in frontier {
            if visited.len() >= budgets.max_nodes {
                break 'rounds;
            }

            let outgoing = store.fetch_links(request.scope, Some(key), None, budgets.max_links)?;
            let incoming = store.fetch_links(request.scope, None, Some(key), budgets.max_links)?;

            for link in outgoing.into_iter().chain(incoming) {
                let Some(peer) = link.peer_of(&key) else {
                    continue;
                };

                let edge = link.edge();
                if link_edges.contains(&edge) || link_edges.len() < budgets.max_links {
                    link_edges.insert(edge);
                    links.push(link);
                } else {
                    links_truncated = true;
                }

                if seen.insert(peer) {
                    visited.push(peer);
                    next.push(peer);
                }
            }
        }
        frontier = next;
    }

    let mut others = Vec::with_capacity(visited.len().saturating_sub(1));
    for key in visited.iter().skip(1) {
        let Some(summary) = store.fetch_node_by_id(key.kind, key.id)? else {
            continue;
        };
        if let Some(owner) = summary.owner {
            owners.insert(*key, owner);
        }
        others.push(GraphNode::new(*key, summary.label));
    }
    if let Some(owner) = root.owner {
        owners.insert(focus, owner);
    }

    others.sort_by(label_order);
    let room = budgets.max_nodes - 1;
    if others.len() > room {
        others.truncate(room);
        builder.mark_truncated();
    }

    let mut nodes = others;
    nodes.push(GraphNode::new(focus, root.label));
    nodes.sort_by(label_order);
    for node in nodes {
        builder.admit(node);
    }

    for link in &links {
        builder.push_link(link);
    }
    if links_truncated {
        builder.mark_truncated();
    }

    Ok((builder, owners))
}

fn attach_attributes(
    store: &dyn GraphStore,
    request: &LoadRequest,
    builder: &mut SnapshotBuilder,
    owners: &HashMap<NodeKey, NodeId>,
) -> Result<(), LoadError> {
    for key in builder.node_keys() {
        if let Some(owner) = owners.get(&key) {
            builder.push_edge(GraphEdge::new(
                NodeKey::entity(*owner),
                key,
                EdgeKind::Containment,
            ));
        }
    }

    let entities = builder
        .node_keys()
        .into_iter()
        .filter(NodeKey::is_entity)
        .collect::<Vec<_>>();

    for owner in entities {
        let remaining = builder.remaining_nodes();
        if remaining == 0 {
            break;
        }

        let mut children = store
            .fetch_attributes(request.scope, owner.id, remaining)?
            .into_iter()
            .map(|summary| GraphNode::new(NodeKey::attribute(summary.id), summary.label))
            .collect::<Vec<_>>();
        children.sort_by(label_order);

        for child in children {
            let key = child.key;
            if builder.admit(child) {
                builder.push_edge(GraphEdge::new(owner, key, EdgeKind::Containment));
            }
        }
    }

    Ok(())
}

/// Tops up the edge budget with more incident links, visiting nodes in
/// snapshot order. Each node may add at most its per-node cap.
fn fill_links(
    store: &dyn GraphStore,
    request: &LoadRequest,
    builder: &mut SnapshotBuilder,
) -> Result<(), LoadError> {
    let keys = builder.node_keys();
    let remaining = builder.remaining_links();
    if remaining == 0 || keys.is_empty() {
        return Ok(());
    }

    let per_node = fair_share(remaining, keys.len());
    for key in keys {
        if builder.remaining_links() == 0 {
            break;
        }

        let outgoing = store.fetch_links(request.scope, Some(key), None, per_node)?;
        let incoming = store.fetch_links(request.scope, None, Some(key), per_node)?;

        let mut added = 0usize;
        for link in outgoing.iter().chain(incoming.iter()) {
            if added >= per_node {
                break;
            }
            if builder.push_link(link) {
                added += 1;
            }
        }
    }

    Ok(())
}
