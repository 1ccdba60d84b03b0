//! Tunable retrieval and distillation parameters.

use crate::error::{BufferError, BufferResult};
use serde::{Deserialize, Serialize};

/// Relative weights of the similarity components.
///
/// Scores are normalized by the weight sum, so only ratios matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    #[serde(default = "default_goal_weight")]
    pub goal: f64,
    #[serde(default = "default_obstacle_weight")]
    pub obstacles: f64,
    #[serde(default = "default_direction_weight")]
    pub direction: f64,
}

/// Configuration for a [`MetaBuffer`](crate::buffer::MetaBuffer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default)]
    pub weights: SimilarityWeights,
    /// Manhattan distance between goal offsets at which goal similarity reaches zero.
    #[serde(default = "default_goal_falloff")]
    pub goal_falloff: f64,
    /// Minimum score for a template to be reused.
    #[serde(default = "default_retrieval_threshold")]
    pub retrieval_threshold: f64,
    /// Minimum score for a new template to be merged into an existing one.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
    /// Maximum number of templates; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// Configuration for the [`ProblemDistiller`](crate::distiller::ProblemDistiller).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistillerConfig {
    /// Chebyshev radius around the agent within which objects are reported.
    #[serde(default = "default_nearby_radius")]
    pub nearby_radius: i32,
}

fn default_goal_weight() -> f64 { 0.5 }
fn default_obstacle_weight() -> f64 { 0.3 }
fn default_direction_weight() -> f64 { 0.2 }
fn default_goal_falloff() -> f64 { 8.0 }
fn default_retrieval_threshold() -> f64 { 0.6 }
fn default_duplicate_threshold() -> f64 { 0.85 }
fn default_nearby_radius() -> i32 { 2 }

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            goal: default_goal_weight(),
            obstacles: default_obstacle_weight(),
            direction: default_direction_weight(),
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.goal + self.obstacles + self.direction
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            weights: SimilarityWeights::default(),
            goal_falloff: default_goal_falloff(),
            retrieval_threshold: default_retrieval_threshold(),
            duplicate_threshold: default_duplicate_threshold(),
            capacity: None,
        }
    }
}

impl BufferConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_thresholds(mut self, retrieval: f64, duplicate: f64) -> Self {
        self.retrieval_threshold = retrieval;
        self.duplicate_threshold = duplicate;
        self
    }

    pub fn with_weights(mut self, weights: SimilarityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Check ranges and the reuse-before-duplicate ordering of the thresholds.
    pub fn validate(&self) -> BufferResult<()> {
        for (field, value) in [
            ("weights.goal", self.weights.goal),
            ("weights.obstacles", self.weights.obstacles),
            ("weights.direction", self.weights.direction),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BufferError::invalid_config(field, value, "must be a finite value >= 0"));
            }
        }
        if self.weights.total() <= 0.0 {
            return Err(BufferError::invalid_config(
                "weights",
                self.weights.total(),
                "at least one weight must be positive",
            ));
        }
        if !(self.goal_falloff > 0.0) {
            return Err(BufferError::invalid_config("goal_falloff", self.goal_falloff, "must be > 0"));
        }
        for (field, value) in [
            ("retrieval_threshold", self.retrieval_threshold),
            ("duplicate_threshold", self.duplicate_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BufferError::invalid_config(field, value, "must be within 0.0-1.0"));
            }
        }
        if self.retrieval_threshold > self.duplicate_threshold {
            return Err(BufferError::invalid_config(
                "retrieval_threshold",
                self.retrieval_threshold,
                format!("must not exceed duplicate_threshold ({})", self.duplicate_threshold),
            ));
        }
        if self.capacity == Some(0) {
            return Err(BufferError::invalid_config("capacity", 0, "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for DistillerConfig {
    fn default() -> Self {
        Self {
            nearby_radius: default_nearby_radius(),
        }
    }
}
