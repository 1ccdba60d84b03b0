//! Similarity between feature summaries.
//!
//! Every component is computed from agent-relative quantities (goal offset,
//! egocentric object positions, heading), so translating a whole layout
//! leaves the score unchanged.

use crate::config::BufferConfig;
use crate::types::{Direction, FeatureSummary};

/// Weighted similarity in `0.0..=1.0`.
pub fn similarity(a: &FeatureSummary, b: &FeatureSummary, config: &BufferConfig) -> f64 {
    let w = &config.weights;
    let total = w.total();
    if total <= 0.0 {
        return 0.0;
    }
    let score = w.goal * goal_score(a, b, config.goal_falloff)
        + w.obstacles * obstacle_score(a, b)
        + w.direction * direction_score(a.facing, b.facing);
    (score / total).clamp(0.0, 1.0)
}

/// Full credit for identical relative goal offsets or two unknown goals,
/// linear decay with the Manhattan distance between offsets otherwise.
pub fn goal_score(a: &FeatureSummary, b: &FeatureSummary, falloff: f64) -> f64 {
    match (a.goal_offset(), b.goal_offset()) {
        (None, None) => 1.0,
        (Some(x), Some(y)) => {
            let d = x.manhattan_to(&y) as f64;
            (1.0 - d / falloff).max(0.0)
        }
        _ => 0.0,
    }
}

/// Jaccard overlap of nearby-object descriptors; two empty sets match fully.
pub fn obstacle_score(a: &FeatureSummary, b: &FeatureSummary) -> f64 {
    if a.nearby.is_empty() && b.nearby.is_empty() {
        return 1.0;
    }
    let intersection = a.nearby.intersection(&b.nearby).count() as f64;
    let union = a.nearby.union(&b.nearby).count() as f64;
    intersection / union
}

/// 1.0 for the same heading, 0.5 for perpendicular, 0.0 for opposite.
pub fn direction_score(a: Direction, b: Direction) -> f64 {
    match a.quarter_turns_to(b) {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    }
}
