use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};

const MIN_DISTANCE: f32 = 0.0001;

/// Unit vector pointing from `b` to `a`. Coincident points get a stable
/// direction derived from their indices so they separate instead of sticking.
pub(super) fn separation_direction(delta: Vec2, distance: f32, i: usize, j: usize) -> Vec2 {
    if distance > MIN_DISTANCE {
        delta / distance
    } else {
        let angle = ((i as f32) * 0.618_034 + (j as f32) * 0.414_214) * TAU;
        vec2(angle.cos(), angle.sin())
    }
}

/// Softened inverse-square push along `direction`.
pub(super) fn repulsion(direction: Vec2, distance_sq: f32, strength: f32, softening: f32) -> Vec2 {
    direction * (strength / (distance_sq + softening))
}

/// Extra push proportional to how far two discs overlap; zero when apart.
pub(super) fn collision(direction: Vec2, distance: f32, min_distance: f32, strength: f32) -> Vec2 {
    if distance >= min_distance {
        return Vec2::ZERO;
    }
    direction * ((min_distance - distance) * strength)
}

#[derive(Clone, Copy, Debug)]
pub(super) struct Spring {
    pub(super) stiffness: f32,
    pub(super) rest_length: f32,
    pub(super) damping: f32,
}

/// Force on the `from` end of a spring. The `to` end receives the negation.
pub(super) fn spring_force(
    spring: Spring,
    delta: Vec2,
    relative_velocity: Vec2,
) -> Option<Vec2> {
    let distance = delta.length();
    if distance <= MIN_DISTANCE {
        return None;
    }

    let direction = delta / distance;
    let stretch = (distance - spring.rest_length) * spring.stiffness;
    let damping = relative_velocity.dot(direction) * spring.damping;
    Some(-direction * (stretch + damping))
}

pub(super) fn clamp_length(value: Vec2, max: f32) -> Vec2 {
    let length_sq = value.length_sq();
    if length_sq > max * max {
        value * (max / length_sq.sqrt())
    } else {
        value
    }
}
