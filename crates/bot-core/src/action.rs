//! The closed action vocabulary shared by the agent, parser and environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primitive grid actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Left,
    Right,
    Forward,
    Pickup,
    Drop,
    Toggle,
    Done,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Left,
        Action::Right,
        Action::Forward,
        Action::Pickup,
        Action::Drop,
        Action::Toggle,
        Action::Done,
    ];

    /// Canonical token used in prompts and LLM answers.
    pub fn token(self) -> &'static str {
        match self {
            Action::Left => "left",
            Action::Right => "right",
            Action::Forward => "forward",
            Action::Pickup => "pickup",
            Action::Drop => "drop",
            Action::Toggle => "toggle",
            Action::Done => "done",
        }
    }

    /// One-line explanation shown to the model.
    pub fn describe(self) -> &'static str {
        match self {
            Action::Left => "turn 90 degrees to the left",
            Action::Right => "turn 90 degrees to the right",
            Action::Forward => "move one cell forward",
            Action::Pickup => "pick up the object in front",
            Action::Drop => "drop the carried object in front",
            Action::Toggle => "open or interact with the object in front",
            Action::Done => "declare the task finished",
        }
    }

    pub fn is_turn(self) -> bool {
        matches!(self, Action::Left | Action::Right)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Action {
    type Err = String;

    /// Exact canonical token only; free text goes through the agent's parser.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.token() == s.trim())
            .ok_or_else(|| format!("unknown action token: {s}"))
    }
}
