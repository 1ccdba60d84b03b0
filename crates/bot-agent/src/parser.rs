//! Free-text LLM answers → closed action set.

use bot_core::action::Action;

/// Phrases accepted for each action, beyond the canonical token.
const SYNONYMS: &[(&str, Action)] = &[
    ("turn left", Action::Left),
    ("rotate left", Action::Left),
    ("turn right", Action::Right),
    ("rotate right", Action::Right),
    ("move forward", Action::Forward),
    ("go forward", Action::Forward),
    ("step forward", Action::Forward),
    ("go ahead", Action::Forward),
    ("move ahead", Action::Forward),
    ("go straight", Action::Forward),
    ("pick up", Action::Pickup),
    ("grab", Action::Pickup),
    ("put down", Action::Drop),
    ("open", Action::Toggle),
    ("interact", Action::Toggle),
    ("finish", Action::Done),
];

/// Outcome of parsing one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub action: Action,
    /// Nothing matched; `action` is the configured default.
    pub fallback: bool,
    /// The phrase that matched, if any.
    pub matched: Option<String>,
}

/// Case-insensitive phrase matcher. The earliest match in the text wins;
/// at equal positions the longer phrase wins.
#[derive(Debug, Clone)]
pub struct ActionParser {
    default_action: Action,
    phrases: Vec<(String, Action)>,
}

impl ActionParser {
    pub fn new(default_action: Action) -> Self {
        let mut phrases: Vec<(String, Action)> = Action::ALL
            .iter()
            .map(|a| (a.token().to_string(), *a))
            .chain(SYNONYMS.iter().map(|(p, a)| (p.to_string(), *a)))
            .collect();
        phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            default_action,
            phrases,
        }
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    pub fn parse(&self, text: &str) -> ParsedAction {
        let padded = format!(" {} ", normalize(text));

        let best = self
            .phrases
            .iter()
            .filter_map(|(phrase, action)| {
                padded
                    .find(&format!(" {phrase} "))
                    .map(|pos| (pos, phrase, *action))
            })
            // Phrases are sorted longest first, so min_by_key keeps the longer one on ties.
            .min_by_key(|(pos, _, _)| *pos);

        match best {
            Some((_, phrase, action)) => ParsedAction {
                action,
                fallback: false,
                matched: Some(phrase.clone()),
            },
            None => ParsedAction {
                action: self.default_action,
                fallback: true,
                matched: None,
            },
        }
    }
}

impl Default for ActionParser {
    fn default() -> Self {
        Self::new(Action::Forward)
    }
}

/// Lowercase, drop code fences and punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    text.replace("```", " ")
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
