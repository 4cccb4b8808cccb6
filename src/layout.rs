use std::collections::{HashMap, HashSet};
use std::f32::consts::{FRAC_PI_2, TAU};

use eframe::egui::{Pos2, Vec2, vec2};

use crate::graph::{EdgeKind, GraphEdge, GraphNode, NodeKey};
use crate::util::stable_angle;

pub const RING_RADIUS: f32 = 320.0;
pub const SATELLITE_RADIUS: f32 = 72.0;

/// Positions and velocities of every visible node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutState {
    pub positions: HashMap<NodeKey, Pos2>,
    pub velocities: HashMap<NodeKey, Vec2>,
}

impl LayoutState {
    pub fn position(&self, key: &NodeKey) -> Option<Pos2> {
        self.positions.get(key).copied()
    }

    pub fn velocity(&self, key: &NodeKey) -> Vec2 {
        self.velocities.get(key).copied().unwrap_or(Vec2::ZERO)
    }

    pub fn place(&mut self, key: NodeKey, position: Pos2) {
        self.positions.insert(key, position);
        self.velocities.insert(key, Vec2::ZERO);
    }

    /// Drops state for nodes that left the snapshot.
    pub fn retain(&mut self, keep: &HashSet<NodeKey>) {
        self.positions.retain(|key, _| keep.contains(key));
        self.velocities.retain(|key, _| keep.contains(key));
    }
}

/// Radius of a satellite ring holding `count` children.
pub fn satellite_radius(count: usize) -> f32 {
    SATELLITE_RADIUS + (count.max(1) as f32).sqrt() * 14.0
}

/// Places `keys` evenly on a satellite ring around `center`.
pub fn place_satellites(center: Pos2, phase: f32, keys: &[NodeKey], layout: &mut LayoutState) {
    let radius = satellite_radius(keys.len());
    for (index, key) in keys.iter().enumerate() {
        let angle = phase + (index as f32 / keys.len() as f32) * TAU;
        layout.place(*key, center + vec2(angle.cos(), angle.sin()) * radius);
    }
}

/// Seeds a full layout. Pinned nodes keep their existing position; every
/// other node is recomputed and all velocities start at zero.
pub fn seed(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    pinned: &HashSet<NodeKey>,
    existing: &HashMap<NodeKey, Pos2>,
) -> LayoutState {
    let present = nodes.iter().map(|node| node.key).collect::<HashSet<_>>();
    let preserved = |key: &NodeKey| {
        pinned
            .contains(key)
            .then(|| existing.get(key).copied())
            .flatten()
    };

    let mut owner_of = HashMap::new();
    for edge in edges {
        if edge.kind() != EdgeKind::Containment {
            continue;
        }
        let (owner, child) = if edge.a().is_entity() {
            (edge.a(), edge.b())
        } else {
            (edge.b(), edge.a())
        };
        if owner.is_entity() && !child.is_entity() && present.contains(&owner) {
            owner_of.entry(child).or_insert(owner);
        }
    }

    let mut children: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
    for node in nodes {
        if let Some(owner) = owner_of.get(&node.key) {
            children.entry(*owner).or_default().push(node.key);
        }
    }

    let mut layout = LayoutState::default();
    let top_level = nodes
        .iter()
        .map(|node| node.key)
        .filter(NodeKey::is_entity)
        .collect::<Vec<_>>();
    let count = top_level.len();
    for (index, key) in top_level.iter().enumerate() {
        let angle = -FRAC_PI_2 + (index as f32 / count as f32) * TAU;
        let ring = (vec2(angle.cos(), angle.sin()) * RING_RADIUS).to_pos2();
        layout.place(*key, preserved(key).unwrap_or(ring));
    }

    for key in &top_level {
        let Some(kids) = children.get(key) else {
            continue;
        };
        let center = layout.position(key).unwrap_or(Pos2::ZERO);
        place_satellites(center, stable_angle(key), kids, &mut layout);
        for kid in kids {
            if let Some(position) = preserved(kid) {
                layout.place(*kid, position);
            }
        }
    }

    for node in nodes {
        if !layout.positions.contains_key(&node.key) {
            layout.place(node.key, preserved(&node.key).unwrap_or(Pos2::ZERO));
        }
    }

    layout
}
