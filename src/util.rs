use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::graph::NodeKey;

/// Deterministic pseudo-random pair in `[-1, 1]` derived from a node key.
pub fn stable_pair(key: &NodeKey) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Stable phase in radians, used to rotate satellite rings per owner.
pub fn stable_angle(key: &NodeKey) -> f32 {
    let (x, _) = stable_pair(key);
    (x + 1.0) * std::f32::consts::PI
}

pub fn short_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }

    let mut short = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    short.push('…');
    short
}
