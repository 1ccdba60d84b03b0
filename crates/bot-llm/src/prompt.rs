//! Prompt plumbing shared by the agent and the backends.

/// A prompt template for LLM requests.
pub trait PromptTemplate {
    /// Generate the user prompt text.
    fn generate(&self) -> String;

    /// Get the system prompt (if any).
    fn system_prompt(&self) -> Option<String> {
        None
    }
}

/// Header line of the machine-readable situation block.
pub const SITUATION_HEADER: &str = "Situation:";

/// Look up `key` in the situation block of a prompt.
///
/// The block starts at [`SITUATION_HEADER`] and holds `- key: value` lines;
/// it ends at the first blank line or line that is not a list item.
pub fn situation_value<'a>(prompt: &'a str, key: &str) -> Option<&'a str> {
    let mut lines = prompt.lines().skip_while(|l| l.trim() != SITUATION_HEADER);
    lines.next()?;

    lines
        .map(str::trim)
        .take_while(|l| l.starts_with("- "))
        .filter_map(|l| l[2..].split_once(':'))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

/// [`situation_value`] parsed as an integer.
pub fn situation_int(prompt: &str, key: &str) -> Option<i32> {
    situation_value(prompt, key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "You see a wall.\n\nSituation:\n- facing: east\n- goal_ahead: 3\n- goal_right: -1\n- front: wall\n\n- stray: 1\n";

    #[test]
    fn test_situation_lookup() {
        assert_eq!(situation_value(PROMPT, "facing"), Some("east"));
        assert_eq!(situation_value(PROMPT, "front"), Some("wall"));
        assert_eq!(situation_int(PROMPT, "goal_ahead"), Some(3));
        assert_eq!(situation_int(PROMPT, "goal_right"), Some(-1));
    }

    #[test]
    fn test_block_boundaries() {
        assert_eq!(situation_value(PROMPT, "stray"), None);
        assert_eq!(situation_value("- facing: east", "facing"), None);
        assert_eq!(situation_int(PROMPT, "facing"), None);
    }
}
