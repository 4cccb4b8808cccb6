use std::collections::HashMap;

use crate::graph::{EdgeKind, GraphEdge, GraphSnapshot, NodeKey, unique_edges};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayedEdges {
    pub edges: Vec<GraphEdge>,
    pub incident_link_count: usize,
    /// Links left out by the degree cap, for a "show N more" control.
    pub hidden_link_count: usize,
}

pub fn edges_for_display(
    snapshot: &GraphSnapshot,
    selection: Option<&NodeKey>,
    degree_cap: usize,
    show_all_for_selection: bool,
) -> DisplayedEdges {
    let Some(selected) = selection else {
        return DisplayedEdges::default();
    };

    let incident = snapshot
        .edges
        .iter()
        .filter(|edge| edge.touches(selected) && !edge.is_loop())
        .copied();
    let (containment, mut links): (Vec<_>, Vec<_>) =
        incident.partition(|edge| edge.kind() == EdgeKind::Containment);

    let labels = snapshot.labels();
    let far_label = |edge: &GraphEdge| -> (String, NodeKey) {
        let other = edge.other(selected).unwrap_or(*selected);
        let label = labels.get(&other).copied().unwrap_or_default();
        (label.to_lowercase(), other)
    };
    let mut keyed = links
        .drain(..)
        .map(|edge| (far_label(&edge), edge))
        .collect::<Vec<_>>();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    let links = keyed.into_iter().map(|(_, edge)| edge).collect::<Vec<_>>();

    let incident_link_count = links.len();
    let (shown, hidden_link_count) = if show_all_for_selection {
        (links, 0)
    } else {
        let hidden = incident_link_count.saturating_sub(degree_cap);
        (links.into_iter().take(degree_cap).collect(), hidden)
    };

    DisplayedEdges {
        edges: unique_edges(containment.into_iter().chain(shown)),
        incident_link_count,
        hidden_link_count,
    }
}

/// Number of displayed edges per kind.
pub fn count_by_kind(edges: &[GraphEdge]) -> HashMap<EdgeKind, usize> {
    let mut counts = HashMap::new();
    for edge in edges {
        *counts.entry(edge.kind()).or_insert(0) += 1;
    }
    counts
}
