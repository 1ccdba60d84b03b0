//! Episode trace — the agent's short-term record of one episode.

use crate::action::Action;
use crate::types::FeatureSummary;
use serde::{Deserialize, Serialize};

/// One decision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub summary: FeatureSummary,
    pub action: Action,
    /// Unknown until the environment reports it.
    pub reward: Option<f64>,
    /// Name of the template injected into the prompt at this step.
    pub template: Option<String>,
    /// The model's answer could not be parsed and the default action was used.
    pub parse_fallback: bool,
}

impl TraceEntry {
    pub fn new(summary: FeatureSummary, action: Action) -> Self {
        Self {
            summary,
            action,
            reward: None,
            template: None,
            parse_fallback: false,
        }
    }

    pub fn with_template(mut self, template: Option<String>) -> Self {
        self.template = template;
        self
    }

    pub fn with_parse_fallback(mut self, fallback: bool) -> Self {
        self.parse_fallback = fallback;
        self
    }
}

/// Ordered steps of a single episode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeTrace {
    episode: u64,
    entries: Vec<TraceEntry>,
}

impl EpisodeTrace {
    pub fn new(episode: u64) -> Self {
        Self {
            episode,
            entries: Vec::new(),
        }
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&TraceEntry> {
        self.entries.first()
    }

    pub fn parse_failures(&self) -> usize {
        self.entries.iter().filter(|e| e.parse_fallback).count()
    }

    /// Set the reward of the most recent step.
    pub fn set_last_reward(&mut self, reward: f64) {
        if let Some(last) = self.entries.last_mut() {
            last.reward = Some(reward);
        }
    }

    /// Fill in rewards that were never reported.
    ///
    /// Unrewarded steps get 0.0 except the last unrewarded one, which
    /// receives whatever part of `total` the known rewards do not explain.
    pub fn backfill_rewards(&mut self, total: f64) {
        let known: f64 = self.entries.iter().filter_map(|e| e.reward).sum();
        let last_missing = self.entries.iter().rposition(|e| e.reward.is_none());
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.reward.is_none() {
                entry.reward = Some(if Some(i) == last_missing { total - known } else { 0.0 });
            }
        }
    }

    pub fn total_reward(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.reward).sum()
    }

    /// The template the episode relied on: the most frequently injected
    /// one, ties going to whichever was used first.
    pub fn template_used(&self) -> Option<&str> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for name in self.entries.iter().filter_map(|e| e.template.as_deref()) {
            match counts.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
        // max_by_key keeps the last maximum, so scan in reverse.
        counts
            .into_iter()
            .rev()
            .max_by_key(|(_, c)| *c)
            .map(|(n, _)| n)
    }
}
