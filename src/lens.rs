use std::collections::{HashMap, HashSet, VecDeque};

use serde::Deserialize;

use crate::graph::{GraphEdge, NodeKey};

/// Opacity for nodes and edges past the second ring when they stay visible.
pub const DIM_OPACITY: f32 = 0.14;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LensSettings {
    pub enabled: bool,
    pub hide_non_relevant: bool,
    pub depth: usize,
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            hide_non_relevant: false,
            depth: 2,
        }
    }
}

impl LensSettings {
    /// Selecting a node always declutters: while a selection exists the lens
    /// is forced on, one hop deep, hiding everything else. Deselecting gives
    /// the stored preference back.
    pub fn effective(self, selection: Option<&NodeKey>) -> Self {
        if selection.is_some() {
            Self {
                enabled: true,
                hide_non_relevant: true,
                depth: 1,
            }
        } else {
            self
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lens {
    active: bool,
    hide_non_relevant: bool,
    distances: HashMap<NodeKey, usize>,
}

impl Lens {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Breadth-first distances from `selection` over the displayed edges,
    /// treated as undirected, up to `settings.depth` hops.
    pub fn build(settings: LensSettings, selection: Option<&NodeKey>, edges: &[GraphEdge]) -> Self {
        let Some(selected) = selection.copied() else {
            return Self::empty();
        };
        if !settings.enabled {
            return Self::empty();
        }

        let mut adjacency: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
        for edge in edges {
            if edge.is_loop() {
                continue;
            }
            adjacency.entry(edge.a()).or_default().push(edge.b());
            adjacency.entry(edge.b()).or_default().push(edge.a());
        }

        let mut distances = HashMap::from([(selected, 0usize)]);
        let mut queue = VecDeque::from([(selected, 0usize)]);
        while let Some((node, distance)) = queue.pop_front() {
            if distance >= settings.depth {
                continue;
            }

            let Some(neighbors) = adjacency.get(&node) else {
                continue;
            };
            for next in neighbors {
                if !distances.contains_key(next) {
                    distances.insert(*next, distance + 1);
                    queue.push_back((*next, distance + 1));
                }
            }
        }

        Self {
            active: true,
            hide_non_relevant: settings.hide_non_relevant,
            distances,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn distance(&self, key: &NodeKey) -> Option<usize> {
        self.distances.get(key).copied()
    }

    pub fn distances(&self) -> &HashMap<NodeKey, usize> {
        &self.distances
    }

    /// Nodes the lens reached, or `None` when the lens is inactive.
    pub fn relevant(&self) -> Option<HashSet<NodeKey>> {
        self.active
            .then(|| self.distances.keys().copied().collect())
    }

    pub fn is_hidden(&self, key: &NodeKey) -> bool {
        self.active && self.hide_non_relevant && !self.distances.contains_key(key)
    }

    pub fn node_opacity(&self, key: &NodeKey) -> f32 {
        if !self.active {
            return 1.0;
        }
        self.tier(self.distance(key))
    }

    /// Edges take the tier of their farther endpoint; an unreached endpoint
    /// puts the edge in the outermost tier.
    pub fn edge_opacity(&self, edge: &GraphEdge) -> f32 {
        if !self.active {
            return 1.0;
        }

        let farthest = match (self.distance(&edge.a()), self.distance(&edge.b())) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        self.tier(farthest)
    }

    fn tier(&self, distance: Option<usize>) -> f32 {
        match distance {
            Some(0) => 1.0,
            Some(1) => 0.92,
            Some(2) => 0.55,
            _ if self.hide_non_relevant => 0.0,
            _ => DIM_OPACITY,
        }
    }
}
