//! BufferManager — template selection and episode consolidation.
//!
//! The manager is cheap to clone; clones share one buffer behind a lock.
//! `consolidate` runs its duplicate re-check and the insertion under a
//! single write guard, so two agents finishing near-identical episodes at
//! the same time cannot both insert a template.

use crate::action::Action;
use crate::buffer::MetaBuffer;
use crate::config::{BufferConfig, DistillerConfig};
use crate::distiller::ProblemDistiller;
use crate::error::{BufferError, BufferResult};
use crate::snapshot::BufferSnapshot;
use crate::template::ThoughtTemplate;
use crate::trace::EpisodeTrace;
use crate::types::{FeatureSummary, GridObservation};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Maximum number of steps spelled out in a synthesized reasoning pattern.
const MAX_PATTERN_STEPS: usize = 12;

/// Result of [`BufferManager::select`].
#[derive(Debug, Clone)]
pub struct Selection {
    /// Best template above the retrieval threshold, if any.
    pub template: Option<ThoughtTemplate>,
    pub score: Option<f64>,
    pub summary: FeatureSummary,
}

/// What consolidation did with a finished episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsolidationOutcome {
    /// The episode failed; the buffer was not touched.
    Discarded,
    /// Success with no recorded steps; nothing to distill.
    Empty,
    /// The template used during the episode was reinforced.
    Reinforced { name: String, usage_count: u64 },
    /// A novel success matched an existing template above the duplicate threshold.
    Merged { name: String, usage_count: u64, score: f64 },
    /// A new template was minted.
    Inserted { name: String, evicted: Option<String> },
}

/// Counters describing buffer activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferStats {
    pub templates: usize,
    pub total_usage: u64,
    pub episodes_started: u64,
    pub minted: u64,
    pub reinforced: u64,
    pub merged: u64,
    pub evictions: u64,
    pub discarded: u64,
}

#[derive(Debug)]
struct BufferState {
    buffer: MetaBuffer,
    next_episode: u64,
    stats: BufferStats,
}

/// Orchestrates the [`ProblemDistiller`] and a shared [`MetaBuffer`].
#[derive(Debug, Clone)]
pub struct BufferManager {
    state: Arc<RwLock<BufferState>>,
    distiller: ProblemDistiller,
}

impl BufferManager {
    /// Create a manager over a new, empty buffer.
    pub fn new(buffer_config: BufferConfig, distiller_config: DistillerConfig) -> BufferResult<Self> {
        let buffer = MetaBuffer::new(buffer_config)?;
        Ok(Self::with_buffer(buffer, ProblemDistiller::new(distiller_config)))
    }

    /// Wrap an existing buffer.
    pub fn with_buffer(buffer: MetaBuffer, distiller: ProblemDistiller) -> Self {
        let next_episode = buffer
            .iter()
            .map(|t| t.created_at_episode() + 1)
            .max()
            .unwrap_or(0);
        Self::from_parts(buffer, distiller, next_episode)
    }

    /// Restore from a snapshot, continuing its episode numbering.
    pub fn from_snapshot(
        snapshot: &BufferSnapshot,
        buffer_config: BufferConfig,
        distiller_config: DistillerConfig,
    ) -> BufferResult<Self> {
        let buffer = snapshot.restore(buffer_config)?;
        let next_episode = buffer
            .iter()
            .map(|t| t.created_at_episode() + 1)
            .max()
            .unwrap_or(0)
            .max(snapshot.next_episode);
        Ok(Self::from_parts(buffer, ProblemDistiller::new(distiller_config), next_episode))
    }

    fn from_parts(buffer: MetaBuffer, distiller: ProblemDistiller, next_episode: u64) -> Self {
        Self {
            state: Arc::new(RwLock::new(BufferState {
                buffer,
                next_episode,
                stats: BufferStats::default(),
            })),
            distiller,
        }
    }

    fn read(&self) -> BufferResult<RwLockReadGuard<'_, BufferState>> {
        self.state
            .read()
            .map_err(|e| BufferError::LockPoisoned(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> BufferResult<RwLockWriteGuard<'_, BufferState>> {
        self.state
            .write()
            .map_err(|e| BufferError::LockPoisoned(format!("Failed to acquire write lock: {}", e)))
    }

    pub fn distiller(&self) -> &ProblemDistiller {
        &self.distiller
    }

    /// Allocate the next episode index.
    pub fn begin_episode(&self) -> BufferResult<u64> {
        let mut state = self.write()?;
        let episode = state.next_episode;
        state.next_episode += 1;
        state.stats.episodes_started += 1;
        Ok(episode)
    }

    /// Distill the observation and retrieve the single best template.
    pub fn select(&self, observation: &GridObservation) -> BufferResult<Selection> {
        let summary = self.distiller.distill(observation);
        let best = self.read()?.buffer.retrieve(&summary, 1).into_iter().next();

        match best {
            Some(hit) => {
                debug!(template = hit.template.name(), score = hit.score, "template retrieved");
                Ok(Selection {
                    score: Some(hit.score),
                    template: Some(hit.template),
                    summary,
                })
            }
            None => {
                debug!(goal = %summary.goal_direction(), "no template above threshold");
                Ok(Selection {
                    template: None,
                    score: None,
                    summary,
                })
            }
        }
    }

    /// Feed a finished episode back into the buffer.
    ///
    /// Failed episodes never mutate the buffer. A successful episode that
    /// relied on a template reinforces it; a novel success either reinforces
    /// a near-duplicate (score at or above the duplicate threshold) or mints
    /// a new template with `usage_count = 1`. A success whose template was
    /// evicted in the meantime takes the novel path.
    pub fn consolidate(&self, trace: EpisodeTrace, success: bool) -> BufferResult<ConsolidationOutcome> {
        let mut state = self.write()?;

        if !success {
            state.stats.discarded += 1;
            debug!(episode = trace.episode(), "failed episode discarded");
            return Ok(ConsolidationOutcome::Discarded);
        }

        if let Some(name) = trace.template_used() {
            if state.buffer.contains(name) {
                let usage_count = state.buffer.update(name, true)?;
                state.stats.reinforced += 1;
                info!(episode = trace.episode(), template = name, usage_count, "template reinforced");
                return Ok(ConsolidationOutcome::Reinforced {
                    name: name.to_string(),
                    usage_count,
                });
            }
            warn!(
                episode = trace.episode(),
                template = name,
                "template evicted before consolidation, treating success as novel"
            );
        }

        let Some(first) = trace.first() else {
            return Ok(ConsolidationOutcome::Empty);
        };
        let signature = first.summary.clone();

        let threshold = state.buffer.config().duplicate_threshold;
        let duplicate = state
            .buffer
            .retrieve_with_threshold(&signature, 1, threshold)
            .into_iter()
            .next();
        if let Some(hit) = duplicate {
            let name = hit.template.name().to_string();
            let usage_count = state.buffer.update(&name, true)?;
            state.stats.merged += 1;
            info!(
                episode = trace.episode(),
                template = %name,
                score = hit.score,
                usage_count,
                "near-duplicate success merged"
            );
            return Ok(ConsolidationOutcome::Merged {
                name,
                usage_count,
                score: hit.score,
            });
        }

        let name = unique_name(&state.buffer, &signature, trace.episode());
        let template = synthesize_template(&trace, &name, signature).with_usage_count(1);
        let evicted = state.buffer.add(template)?.map(|t| t.name().to_string());
        state.stats.minted += 1;
        if evicted.is_some() {
            state.stats.evictions += 1;
        }
        info!(episode = trace.episode(), template = %name, evicted = ?evicted, "template minted");

        Ok(ConsolidationOutcome::Inserted { name, evicted })
    }

    pub fn len(&self) -> BufferResult<usize> {
        Ok(self.read()?.buffer.len())
    }

    pub fn is_empty(&self) -> BufferResult<bool> {
        Ok(self.read()?.buffer.is_empty())
    }

    pub fn get(&self, name: &str) -> BufferResult<ThoughtTemplate> {
        self.read()?.buffer.get(name).cloned()
    }

    /// Copies of all templates, most used first.
    pub fn templates(&self) -> BufferResult<Vec<ThoughtTemplate>> {
        let mut templates: Vec<_> = self.read()?.buffer.iter().cloned().collect();
        templates.sort_by(|a, b| {
            b.usage_count()
                .cmp(&a.usage_count())
                .then_with(|| a.created_at_episode().cmp(&b.created_at_episode()))
        });
        Ok(templates)
    }

    pub fn stats(&self) -> BufferResult<BufferStats> {
        let state = self.read()?;
        Ok(BufferStats {
            templates: state.buffer.len(),
            total_usage: state.buffer.total_usage(),
            ..state.stats.clone()
        })
    }

    pub fn snapshot(&self) -> BufferResult<BufferSnapshot> {
        let state = self.read()?;
        Ok(BufferSnapshot::capture(&state.buffer, state.next_episode))
    }

    pub fn save(&self, path: &Path) -> BufferResult<()> {
        self.snapshot()?.save(path)
    }

    /// Load a snapshot from `path`, or start empty when the file is missing.
    pub fn load_or_new(
        path: &Path,
        buffer_config: BufferConfig,
        distiller_config: DistillerConfig,
    ) -> BufferResult<Self> {
        if path.exists() {
            let snapshot = BufferSnapshot::load(path)?;
            info!(path = %path.display(), templates = snapshot.templates.len(), "buffer loaded");
            Self::from_snapshot(&snapshot, buffer_config, distiller_config)
        } else {
            Self::new(buffer_config, distiller_config)
        }
    }
}

fn unique_name(buffer: &MetaBuffer, signature: &FeatureSummary, episode: u64) -> String {
    let stem = match signature.goal_direction().as_str() {
        "unknown" => "explore".to_string(),
        "here" => "hold".to_string(),
        dir => format!("reach-{dir}"),
    };
    let base = format!("{stem}-ep{episode}");
    let mut candidate = base.clone();
    let mut suffix = 2;
    while buffer.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    candidate
}

fn action_phrase(action: Action) -> &'static str {
    match action {
        Action::Left => "turn left",
        Action::Right => "turn right",
        Action::Forward => "move forward",
        Action::Pickup => "pick up the object ahead",
        Action::Drop => "drop the carried object",
        Action::Toggle => "toggle the object ahead",
        Action::Done => "declare done",
    }
}

fn situation_phrase(direction: &str) -> String {
    match direction {
        "unknown" => "While the goal is not visible".to_string(),
        "here" => "Once on the goal".to_string(),
        dir => format!("While the goal is {dir}"),
    }
}

/// Build a template from a successful trace.
///
/// Absolute coordinates are dropped: each step is described by where the
/// goal lay relative to the agent at that moment and what the agent did.
fn synthesize_template(trace: &EpisodeTrace, name: &str, signature: FeatureSummary) -> ThoughtTemplate {
    let mut runs: Vec<(String, Action, usize)> = Vec::new();
    for entry in trace.entries() {
        let direction = entry.summary.goal_direction();
        match runs.last_mut() {
            Some((d, a, n)) if *d == direction && *a == entry.action => *n += 1,
            _ => runs.push((direction, entry.action, 1)),
        }
    }

    let mut pattern = String::from(
        "Current situation: facing {facing}, goal at {goal} ({goal_direction}), front {front}, nearby: {obstacles}.\n\
         Plan distilled from a successful run:\n",
    );
    for (i, (direction, action, count)) in runs.iter().take(MAX_PATTERN_STEPS).enumerate() {
        let repeat = if *count > 1 { format!(" (x{count})") } else { String::new() };
        pattern.push_str(&format!(
            "{}. {}: {}{}.\n",
            i + 1,
            situation_phrase(direction),
            action_phrase(*action),
            repeat
        ));
    }
    if runs.len() > MAX_PATTERN_STEPS {
        pattern.push_str("... continue the same way until the goal is reached.\n");
    }
    pattern.push_str(
        "Rule: turn until the goal is ahead, advance while the front cell is clear, \
         and step around blockers by turning toward the goal's side.",
    );

    let description = match signature.goal_ahead_right() {
        Some(_) => format!(
            "Reach a goal starting {} with {} nearby object(s) in {} step(s)",
            signature.goal_direction(),
            signature.nearby.len(),
            trace.len()
        ),
        None => format!("Explore until the goal is visible, then reach it ({} step(s))", trace.len()),
    };

    ThoughtTemplate::new(name, description, pattern, signature, trace.episode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceEntry;
    use crate::types::*;

    fn manager() -> BufferManager {
        BufferManager::new(BufferConfig::default(), DistillerConfig::default()).unwrap()
    }

    fn trace(episode: u64, start: (i32, i32), goal: (i32, i32), template: Option<&str>) -> EpisodeTrace {
        let summary = FeatureSummary::new(
            GridPos::new(start.0, start.1),
            Direction::East,
            GoalLocation::Known(GridPos::new(goal.0, goal.1)),
        );
        let mut t = EpisodeTrace::new(episode);
        t.push(TraceEntry::new(summary.clone(), Action::Forward).with_template(template.map(String::from)));
        t.push(TraceEntry::new(summary, Action::Right).with_template(template.map(String::from)));
        t
    }

    #[test]
    fn test_failed_episode_discarded() {
        let m = manager();
        let outcome = m.consolidate(trace(0, (0, 0), (4, 4), None), false).unwrap();
        assert_eq!(outcome, ConsolidationOutcome::Discarded);
        assert_eq!(m.len().unwrap(), 0);
    }

    #[test]
    fn test_novel_success_mints() {
        let m = manager();
        let outcome = m.consolidate(trace(0, (0, 0), (4, 4), None), true).unwrap();
        let ConsolidationOutcome::Inserted { name, evicted } = outcome else {
            panic!("expected insertion");
        };
        assert_eq!(name, "reach-ahead-right-ep0");
        assert!(evicted.is_none());

        let t = m.get(&name).unwrap();
        assert_eq!(t.usage_count(), 1);
        assert!(t.reasoning_pattern().contains("{goal_direction}"));
        assert!(t.reasoning_pattern().contains("While the goal is ahead-right: move forward."));
        assert!(!t.reasoning_pattern().contains("(4, 4)"));
    }

    #[test]
    fn test_used_template_reinforced() {
        let m = manager();
        m.consolidate(trace(0, (0, 0), (4, 4), None), true).unwrap();
        let outcome = m
            .consolidate(trace(1, (0, 0), (-5, 9), Some("reach-ahead-right-ep0")), true)
            .unwrap();
        assert_eq!(
            outcome,
            ConsolidationOutcome::Reinforced {
                name: "reach-ahead-right-ep0".into(),
                usage_count: 2
            }
        );
        assert_eq!(m.len().unwrap(), 1);
    }

    #[test]
    fn test_evicted_template_success_is_minted() {
        let m = manager();
        let outcome = m.consolidate(trace(3, (0, 0), (4, 4), Some("gone")), true).unwrap();
        assert_eq!(
            outcome,
            ConsolidationOutcome::Inserted {
                name: "reach-ahead-right-ep3".into(),
                evicted: None
            }
        );
        assert_eq!(m.stats().unwrap().reinforced, 0);
    }

    #[test]
    fn test_evicted_template_success_merges_into_duplicate() {
        let m = manager();
        m.consolidate(trace(0, (0, 0), (4, 4), None), true).unwrap();
        let outcome = m.consolidate(trace(1, (1, 1), (5, 5), Some("gone")), true).unwrap();
        assert!(matches!(
            outcome,
            ConsolidationOutcome::Merged { ref name, usage_count: 2, .. } if name == "reach-ahead-right-ep0"
        ));
        assert_eq!(m.len().unwrap(), 1);
    }

    #[test]
    fn test_begin_episode_monotonic() {
        let m = manager();
        assert_eq!(m.begin_episode().unwrap(), 0);
        assert_eq!(m.clone().begin_episode().unwrap(), 1);
        assert_eq!(m.stats().unwrap().episodes_started, 2);
    }

    #[test]
    fn test_unique_name_suffix() {
        let mut buffer = MetaBuffer::new(BufferConfig::default()).unwrap();
        let sig = FeatureSummary::new(GridPos::new(0, 0), Direction::East, GoalLocation::Unknown);
        buffer
            .add(ThoughtTemplate::new("explore-ep3", "", "", sig.clone(), 3))
            .unwrap();
        assert_eq!(unique_name(&buffer, &sig, 3), "explore-ep3-2");
    }
}
