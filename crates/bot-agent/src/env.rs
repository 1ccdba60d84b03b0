//! The environment interface the runner drives.

use crate::error::AgentResult;
use bot_core::action::Action;
use bot_core::types::{CellKind, GridObservation, NearbyObject};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Most objects listed in a rendered observation.
const MAX_DESCRIBED: usize = 12;

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Goal,
    Lava,
    StepLimit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Termination::Goal => "goal",
            Termination::Lava => "lava",
            Termination::StepLimit => "step-limit",
        })
    }
}

/// Extra information returned with each step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// The episode ended and counts as solved.
    pub success: bool,
    pub termination: Option<Termination>,
    /// A forward move was blocked.
    pub blocked: bool,
}

/// Result of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: GridObservation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Episodic environment with grid observations.
pub trait Environment {
    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> AgentResult<GridObservation>;

    /// Apply one action.
    fn step(&mut self, action: Action) -> AgentResult<StepOutcome>;
}

/// Render an observation as text for the model.
pub fn describe_observation(observation: &GridObservation) -> String {
    let mut objects: Vec<(i32, NearbyObject)> = observation
        .cells
        .iter()
        .filter(|c| c.kind != CellKind::Empty && c.pos != observation.agent)
        .map(|c| {
            let offset = observation.agent.offset_to(&c.pos);
            let (ahead, right) = offset.egocentric(observation.facing);
            (offset.manhattan(), NearbyObject::new(c.kind, ahead, right))
        })
        .collect();
    // Goal first, then by distance.
    objects.sort_by_key(|(d, o)| (o.kind != CellKind::Goal, *d, *o));

    let mut text = format!(
        "Mission: {}. You are at {} facing {}.",
        observation.mission, observation.agent, observation.facing
    );
    if objects.is_empty() {
        text.push_str(" You see nothing around you.");
        return text;
    }

    let listed: Vec<String> = objects
        .iter()
        .take(MAX_DESCRIBED)
        .map(|(_, o)| o.to_string())
        .collect();
    text.push_str(&format!(" You see: {}", listed.join(", ")));
    if objects.len() > MAX_DESCRIBED {
        text.push_str(&format!(" and {} more", objects.len() - MAX_DESCRIBED));
    }
    text.push('.');
    text
}
