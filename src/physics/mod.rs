mod forces;

use std::collections::{HashMap, HashSet};

use eframe::egui::Vec2;

use crate::config::PhysicsConfig;
use crate::graph::{EdgeKind, GraphEdge, GraphNode, NodeKey, NodeKind};
use crate::layout::LayoutState;
use forces::{Spring, clamp_length, collision, repulsion, separation_direction, spring_force};

const FORCE_TO_VELOCITY: f32 = 0.055;
const SLEEP_SPEED_SQ: f32 = 0.02 * 0.02;
const SLEEP_FORCE_SQ: f32 = 0.08 * 0.08;

pub fn node_radius(kind: NodeKind) -> f32 {
    match kind {
        NodeKind::Entity => 18.0,
        NodeKind::Attribute => 10.0,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulationState {
    Running,
    #[default]
    Stopped,
}

/// Everything one tick reads besides the layout it mutates.
#[derive(Clone, Copy, Debug)]
pub struct TickInput<'a> {
    pub nodes: &'a [GraphNode],
    /// Full edge set of the snapshot; springs ignore what is currently drawn.
    pub edges: &'a [GraphEdge],
    /// Pinned or dragged nodes: they push others but never move.
    pub fixed: &'a HashSet<NodeKey>,
    /// Lens-relevant nodes; `None` simulates everything.
    pub relevant: Option<&'a HashSet<NodeKey>>,
}

#[derive(Clone, Debug, Default)]
pub struct ForceLayoutSimulator {
    state: SimulationState,
    config: PhysicsConfig,
}

impl ForceLayoutSimulator {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            state: SimulationState::Stopped,
            config: config.sanitized(),
        }
    }

    pub fn start(&mut self) {
        self.state = SimulationState::Running;
    }

    pub fn stop(&mut self) {
        self.state = SimulationState::Stopped;
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimulationState::Running
    }

    pub fn config(&self) -> PhysicsConfig {
        self.config
    }

    pub fn set_config(&mut self, config: PhysicsConfig) {
        self.config = config.sanitized();
    }

    /// Advances the layout by one tick. Returns whether any node moved.
    ///
    /// Forces are computed against the positions at the start of the tick, in
    /// the order repulsion, collision, springs, then integration.
    pub fn step(&self, input: TickInput<'_>, layout: &mut LayoutState, delta_seconds: f32) -> bool {
        if !self.is_running() || input.nodes.len() < 2 {
            return false;
        }

        let config = self.config;
        let time_step_scale = (delta_seconds * 60.0).clamp(0.25, 3.0);
        let damping_factor = config.velocity_damping.powf(time_step_scale);

        let start = layout
            .positions
            .iter()
            .map(|(key, position)| (*key, position.to_vec2()))
            .collect::<HashMap<_, _>>();

        let simulated = input
            .nodes
            .iter()
            .filter(|node| start.contains_key(&node.key))
            .filter(|node| input.relevant.is_none_or(|relevant| relevant.contains(&node.key)))
            .collect::<Vec<_>>();
        let simulated_keys = simulated.iter().map(|node| node.key).collect::<HashSet<_>>();

        for node in input.nodes {
            if !simulated_keys.contains(&node.key) || input.fixed.contains(&node.key) {
                layout.velocities.insert(node.key, Vec2::ZERO);
            }
        }

        let mut forces: HashMap<NodeKey, Vec2> = simulated
            .iter()
            .filter(|node| !input.fixed.contains(&node.key))
            .map(|node| (node.key, Vec2::ZERO))
            .collect();

        for (i, a) in simulated.iter().enumerate() {
            let Some(force) = forces.get_mut(&a.key) else {
                continue;
            };
            let point = start[&a.key];
            for (j, b) in simulated.iter().enumerate() {
                if i == j {
                    continue;
                }

                let delta = point - start[&b.key];
                let distance_sq = delta.length_sq();
                let distance = distance_sq.sqrt();
                let direction = separation_direction(delta, distance, i, j);

                *force += repulsion(direction, distance_sq, config.repulsion, config.softening);

                let min_distance = node_radius(a.key.kind)
                    + node_radius(b.key.kind)
                    + config.collision_padding;
                *force += collision(direction, distance, min_distance, config.collision_strength);
            }
        }

        for edge in input.edges {
            if edge.is_loop() {
                continue;
            }
            let (a, b) = (edge.a(), edge.b());
            if !forces.contains_key(&a) && !forces.contains_key(&b) {
                continue;
            }
            let (Some(&point_a), Some(&point_b)) = (start.get(&a), start.get(&b)) else {
                continue;
            };

            let spring = match edge.kind() {
                EdgeKind::Link => Spring {
                    stiffness: config.link_spring,
                    rest_length: config.link_rest_length,
                    damping: config.spring_damping,
                },
                EdgeKind::Containment => Spring {
                    stiffness: config.containment_spring,
                    rest_length: config.containment_rest_length,
                    damping: config.spring_damping,
                },
            };
            let relative_velocity = layout.velocity(&a) - layout.velocity(&b);
            let Some(pull) = spring_force(spring, point_a - point_b, relative_velocity) else {
                continue;
            };

            if let Some(force) = forces.get_mut(&a) {
                *force += pull;
            }
            if let Some(force) = forces.get_mut(&b) {
                *force -= pull;
            }
        }

        let mut any_motion = false;
        for (key, force) in forces {
            let force = clamp_length(force, config.max_force);
            let mut velocity = (layout.velocity(&key)
                + force * (FORCE_TO_VELOCITY * time_step_scale))
                * damping_factor;
            velocity = clamp_length(velocity, config.max_speed);

            let speed_sq = velocity.length_sq();
            if speed_sq < SLEEP_SPEED_SQ && force.length_sq() < SLEEP_FORCE_SQ {
                velocity = Vec2::ZERO;
            } else if speed_sq > 0.000_001 {
                any_motion = true;
            }

            layout.velocities.insert(key, velocity);
            if let Some(position) = layout.positions.get_mut(&key) {
                *position += velocity * time_step_scale;
            }
        }

        any_motion
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::{Pos2, pos2};
    use uuid::Uuid;

    use super::*;

    fn entity(n: u128) -> NodeKey {
        NodeKey::entity(Uuid::from_u128(n))
    }

    fn node(key: NodeKey) -> GraphNode {
        GraphNode::new(key, key.to_string())
    }

    fn running() -> ForceLayoutSimulator {
        let mut simulator = ForceLayoutSimulator::new(PhysicsConfig::default());
        simulator.start();
        simulator
    }

    fn layout_of(points: &[(NodeKey, Pos2)]) -> LayoutState {
        let mut layout = LayoutState::default();
        for (key, position) in points {
            layout.place(*key, *position);
        }
        layout
    }

    #[test]
    fn starts_stopped_and_does_nothing_until_started() {
        let a = entity(1);
        let b = entity(2);
        let nodes = [node(a), node(b)];
        let mut layout = layout_of(&[(a, pos2(0.0, 0.0)), (b, pos2(10.0, 0.0))]);
        let before = layout.clone();
        let fixed = HashSet::new();
        let input = TickInput {
            nodes: &nodes,
            edges: &[],
            fixed: &fixed,
            relevant: None,
        };

        let mut simulator = ForceLayoutSimulator::new(PhysicsConfig::default());
        assert_eq!(simulator.state(), SimulationState::Stopped);
        assert!(!simulator.step(input, &mut layout, 1.0 / 60.0));
        assert_eq!(layout, before);

        simulator.start();
        assert!(simulator.step(input, &mut layout, 1.0 / 60.0));
        assert!(layout.positions[&a].x < 0.0);
        assert!(layout.positions[&b].x > 10.0);
    }

    #[test]
    fn single_node_is_never_simulated() {
        let a = entity(1);
        let nodes = [node(a)];
        let mut layout = layout_of(&[(a, pos2(5.0, 5.0))]);
        let fixed = HashSet::new();

        let moved = running().step(
            TickInput {
                nodes: &nodes,
                edges: &[],
                fixed: &fixed,
                relevant: None,
            },
            &mut layout,
            1.0 / 60.0,
        );
        assert!(!moved);
        assert_eq!(layout.positions[&a], pos2(5.0, 5.0));
    }

    #[test]
    fn pinned_node_never_moves() {
        let pinned = entity(1);
        let others = (2..8).map(entity).collect::<Vec<_>>();
        let mut nodes = vec![node(pinned)];
        nodes.extend(others.iter().copied().map(node));
        let edges = others
            .iter()
            .map(|other| GraphEdge::new(pinned, *other, EdgeKind::Link))
            .collect::<Vec<_>>();

        let mut points = vec![(pinned, pos2(3.0, 4.0))];
        points.extend(
            others
                .iter()
                .enumerate()
                .map(|(index, key)| (*key, pos2(index as f32 * 2.0, 1.0))),
        );
        let mut layout = layout_of(&points);
        let fixed = HashSet::from([pinned]);
        let simulator = running();

        for _ in 0..200 {
            simulator.step(
                TickInput {
                    nodes: &nodes,
                    edges: &edges,
                    fixed: &fixed,
                    relevant: None,
                },
                &mut layout,
                1.0 / 60.0,
            );
        }

        assert_eq!(layout.positions[&pinned], pos2(3.0, 4.0));
        assert_eq!(layout.velocity(&pinned), Vec2::ZERO);
    }

    #[test]
    fn nodes_outside_the_lens_are_frozen() {
        let a = entity(1);
        let b = entity(2);
        let outsider = entity(3);
        let nodes = [node(a), node(b), node(outsider)];
        let mut layout = layout_of(&[
            (a, pos2(0.0, 0.0)),
            (b, pos2(5.0, 0.0)),
            (outsider, pos2(8.0, 0.0)),
        ]);
        layout.velocities.insert(outsider, Vec2::new(4.0, 4.0));
        let fixed = HashSet::new();
        let relevant = HashSet::from([a, b]);

        running().step(
            TickInput {
                nodes: &nodes,
                edges: &[],
                fixed: &fixed,
                relevant: Some(&relevant),
            },
            &mut layout,
            1.0 / 60.0,
        );

        assert_eq!(layout.positions[&outsider], pos2(8.0, 0.0));
        assert_eq!(layout.velocity(&outsider), Vec2::ZERO);
        assert_ne!(layout.positions[&a], pos2(0.0, 0.0));
    }

    #[test]
    fn stretched_link_pulls_its_ends_closer() {
        let a = entity(1);
        let b = entity(2);
        let nodes = [node(a), node(b)];
        let edges = [GraphEdge::new(a, b, EdgeKind::Link)];
        let mut layout = layout_of(&[(a, pos2(-1500.0, 0.0)), (b, pos2(1500.0, 0.0))]);
        let fixed = HashSet::new();

        running().step(
            TickInput {
                nodes: &nodes,
                edges: &edges,
                fixed: &fixed,
                relevant: None,
            },
            &mut layout,
            1.0 / 60.0,
        );

        assert!(layout.positions[&a].distance(layout.positions[&b]) < 3000.0);
    }

    #[test]
    fn speed_is_clamped() {
        let a = entity(1);
        let b = entity(2);
        let nodes = [node(a), node(b)];
        let mut layout = layout_of(&[(a, pos2(0.0, 0.0)), (b, pos2(0.5, 0.0))]);
        let fixed = HashSet::new();
        let simulator = running();

        simulator.step(
            TickInput {
                nodes: &nodes,
                edges: &[],
                fixed: &fixed,
                relevant: None,
            },
            &mut layout,
            1.0 / 60.0,
        );

        let max_speed = simulator.config().max_speed;
        assert!(layout.velocity(&a).length() <= max_speed + 1e-3);
        assert!(layout.velocity(&b).length() <= max_speed + 1e-3);
    }
}
