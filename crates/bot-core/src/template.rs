//! ThoughtTemplate — a named, reusable navigation strategy.

use crate::types::FeatureSummary;
use serde::{Deserialize, Serialize};

/// Placeholders recognised in a reasoning pattern.
pub const PLACEHOLDERS: [&str; 5] = ["{facing}", "{goal}", "{goal_direction}", "{front}", "{obstacles}"];

/// A stored strategy keyed by the feature summary it was distilled from.
///
/// Everything except `usage_count` is fixed at construction; the count only
/// ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtTemplate {
    name: String,
    description: String,
    reasoning_pattern: String,
    feature_signature: FeatureSummary,
    usage_count: u64,
    created_at_episode: u64,
}

impl ThoughtTemplate {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        reasoning_pattern: impl Into<String>,
        feature_signature: FeatureSummary,
        created_at_episode: u64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            reasoning_pattern: reasoning_pattern.into(),
            feature_signature,
            usage_count: 0,
            created_at_episode,
        }
    }

    /// Set the starting usage count.
    pub fn with_usage_count(mut self, usage_count: u64) -> Self {
        self.usage_count = usage_count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reasoning_pattern(&self) -> &str {
        &self.reasoning_pattern
    }

    pub fn feature_signature(&self) -> &FeatureSummary {
        &self.feature_signature
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn created_at_episode(&self) -> u64 {
        self.created_at_episode
    }

    pub(crate) fn reinforce(&mut self) -> u64 {
        self.usage_count = self.usage_count.saturating_add(1);
        self.usage_count
    }

    /// Fill the reasoning pattern's placeholders from the current situation.
    pub fn render(&self, current: &FeatureSummary) -> String {
        let goal = match current.goal.position() {
            Some(pos) => pos.to_string(),
            None => "unknown".to_string(),
        };
        let front = current
            .front()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "clear".to_string());

        self.reasoning_pattern
            .replace("{facing}", current.facing.as_str())
            .replace("{goal_direction}", &current.goal_direction())
            .replace("{goal}", &goal)
            .replace("{front}", &front)
            .replace("{obstacles}", &current.obstacles_description())
    }
}
