//! MetaBuffer — the template store.
//!
//! Templates live in an arena of slots addressed through a name index. A
//! second, ordered index keyed by `(usage_count, created_at_episode)` is
//! kept in step with every mutation so the eviction candidate is always the
//! first entry, found in O(log n) rather than by scanning.

use crate::config::BufferConfig;
use crate::error::{BufferError, BufferResult};
use crate::similarity::similarity;
use crate::template::ThoughtTemplate;
use crate::types::FeatureSummary;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Position in the eviction order: least reinforced first, then oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EvictionKey {
    usage_count: u64,
    created_at_episode: u64,
    slot: usize,
}

/// A template returned by retrieval, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub template: ThoughtTemplate,
    pub score: f64,
}

/// Collection of [`ThoughtTemplate`]s with similarity retrieval.
#[derive(Debug, Clone)]
pub struct MetaBuffer {
    config: BufferConfig,
    slots: Vec<Option<ThoughtTemplate>>,
    free: Vec<usize>,
    by_name: HashMap<String, usize>,
    eviction: BTreeSet<EvictionKey>,
}

impl MetaBuffer {
    /// Create an empty buffer. Fails if the config is invalid.
    pub fn new(config: BufferConfig) -> BufferResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            by_name: HashMap::new(),
            eviction: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.config.capacity
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> BufferResult<&ThoughtTemplate> {
        self.by_name
            .get(name)
            .and_then(|&slot| self.slots[slot].as_ref())
            .ok_or_else(|| BufferError::NotFound(name.to_string()))
    }

    /// All stored templates, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ThoughtTemplate> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Sum of all usage counts.
    pub fn total_usage(&self) -> u64 {
        self.iter().map(|t| t.usage_count()).sum()
    }

    /// The template that the next insertion at capacity would evict.
    pub fn eviction_candidate(&self) -> Option<&ThoughtTemplate> {
        self.eviction
            .iter()
            .next()
            .and_then(|key| self.slots[key.slot].as_ref())
    }

    /// Insert a template, evicting one first if the buffer is full.
    ///
    /// Returns the evicted template, if any. Fails with
    /// [`BufferError::DuplicateName`] without touching the store when the
    /// name is taken.
    pub fn add(&mut self, template: ThoughtTemplate) -> BufferResult<Option<ThoughtTemplate>> {
        if self.by_name.contains_key(template.name()) {
            return Err(BufferError::DuplicateName(template.name().to_string()));
        }

        let evicted = match self.config.capacity {
            Some(cap) if self.len() >= cap => self.evict_one(),
            _ => None,
        };

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };

        self.eviction.insert(EvictionKey {
            usage_count: template.usage_count(),
            created_at_episode: template.created_at_episode(),
            slot,
        });
        self.by_name.insert(template.name().to_string(), slot);
        debug!(name = template.name(), slot, "template added");
        self.slots[slot] = Some(template);

        Ok(evicted)
    }

    fn evict_one(&mut self) -> Option<ThoughtTemplate> {
        let key = self.eviction.pop_first()?;
        let template = self.slots[key.slot].take()?;
        self.by_name.remove(template.name());
        self.free.push(key.slot);
        debug!(
            name = template.name(),
            usage_count = template.usage_count(),
            created_at_episode = template.created_at_episode(),
            "template evicted"
        );
        Some(template)
    }

    /// Reinforce a template after a successful episode.
    ///
    /// Increments `usage_count` when `success` is true; otherwise leaves it
    /// untouched. Returns the resulting count.
    pub fn update(&mut self, name: &str, success: bool) -> BufferResult<u64> {
        let slot = *self
            .by_name
            .get(name)
            .ok_or_else(|| BufferError::NotFound(name.to_string()))?;
        let template = self.slots[slot]
            .as_mut()
            .ok_or_else(|| BufferError::NotFound(name.to_string()))?;

        if !success {
            return Ok(template.usage_count());
        }

        let old_key = EvictionKey {
            usage_count: template.usage_count(),
            created_at_episode: template.created_at_episode(),
            slot,
        };
        let usage_count = template.reinforce();
        self.eviction.remove(&old_key);
        self.eviction.insert(EvictionKey {
            usage_count,
            ..old_key
        });
        Ok(usage_count)
    }

    /// Top-`k` templates scoring at least the retrieval threshold.
    pub fn retrieve(&self, summary: &FeatureSummary, k: usize) -> Vec<Retrieval> {
        self.retrieve_with_threshold(summary, k, self.config.retrieval_threshold)
    }

    /// Top-`k` templates scoring at least `threshold`.
    ///
    /// Ordered by score, then higher `usage_count`, then earlier
    /// `created_at_episode`. An empty buffer yields an empty vec.
    pub fn retrieve_with_threshold(
        &self,
        summary: &FeatureSummary,
        k: usize,
        threshold: f64,
    ) -> Vec<Retrieval> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&ThoughtTemplate, f64)> = self
            .iter()
            .map(|t| (t, similarity(summary, t.feature_signature(), &self.config)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| rank(a, b));

        scored
            .into_iter()
            .take(k)
            .map(|(template, score)| Retrieval {
                template: template.clone(),
                score,
            })
            .collect()
    }
}

fn rank(a: &(&ThoughtTemplate, f64), b: &(&ThoughtTemplate, f64)) -> Ordering {
    b.1.total_cmp(&a.1)
        .then_with(|| b.0.usage_count().cmp(&a.0.usage_count()))
        .then_with(|| a.0.created_at_episode().cmp(&b.0.created_at_episode()))
        .then_with(|| a.0.name().cmp(b.0.name()))
}
