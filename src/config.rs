use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::graph::Budgets;
use crate::lens::LensSettings;

/// Tuning for the live layout. Forces are in world units per tick at 60 Hz.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub repulsion: f32,
    pub softening: f32,
    /// Multiplier on the overlap push; higher resolves overlap faster but jitters.
    pub collision_strength: f32,
    pub collision_padding: f32,
    pub link_spring: f32,
    pub link_rest_length: f32,
    pub containment_spring: f32,
    pub containment_rest_length: f32,
    pub spring_damping: f32,
    pub velocity_damping: f32,
    pub max_force: f32,
    pub max_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            repulsion: 52_000.0,
            softening: 620.0,
            collision_strength: 1.2,
            collision_padding: 14.0,
            link_spring: 0.018,
            link_rest_length: 150.0,
            containment_spring: 0.06,
            containment_rest_length: 62.0,
            spring_damping: 0.22,
            velocity_damping: 0.86,
            max_force: 240.0,
            max_speed: 18.0,
        }
    }
}

impl PhysicsConfig {
    /// Clamps user-tunable values into ranges the integrator stays stable in.
    pub fn sanitized(self) -> Self {
        Self {
            repulsion: self.repulsion.clamp(0.0, 400_000.0),
            softening: self.softening.max(1.0),
            collision_strength: self.collision_strength.clamp(0.0, 4.0),
            collision_padding: self.collision_padding.max(0.0),
            link_spring: self.link_spring.clamp(0.0, 0.5),
            link_rest_length: self.link_rest_length.max(1.0),
            containment_spring: self.containment_spring.clamp(0.0, 0.5),
            containment_rest_length: self.containment_rest_length.max(1.0),
            spring_damping: self.spring_damping.clamp(0.0, 1.0),
            velocity_damping: self.velocity_damping.clamp(0.5, 0.99),
            max_force: self.max_force.max(1.0),
            max_speed: self.max_speed.max(0.1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub budgets: Budgets,
    pub hops: usize,
    pub include_attributes: bool,
    /// Link edges drawn for a selected node before "show more" kicks in.
    pub degree_cap: usize,
    pub lens: LensSettings,
    pub physics: PhysicsConfig,
    /// Fixed simulation step, independent of the render rate.
    pub tick_interval_secs: f32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            budgets: Budgets::default(),
            hops: 2,
            include_attributes: true,
            degree_cap: 12,
            lens: LensSettings::default(),
            physics: PhysicsConfig::default(),
            tick_interval_secs: 1.0 / 60.0,
        }
    }
}

impl ExplorerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("invalid settings JSON")?;
        Ok(config.sanitized())
    }

    pub fn sanitized(mut self) -> Self {
        self.physics = self.physics.sanitized();
        self.tick_interval_secs = self.tick_interval_secs.clamp(1.0 / 240.0, 0.25);
        self
    }
}
