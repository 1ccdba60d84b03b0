//! The per-step prompt: observation text, situation block and, when one
//! was retrieved, the filled-in thought template.

use crate::env::describe_observation;
use bot_core::action::Action;
use bot_core::template::ThoughtTemplate;
use bot_core::types::{FeatureSummary, GridObservation};
use bot_llm::{PromptTemplate, SITUATION_HEADER};
use std::fmt::Write;

/// Prompt for a single decision.
#[derive(Debug, Clone)]
pub struct StepPrompt<'a> {
    observation: &'a GridObservation,
    summary: &'a FeatureSummary,
    template: Option<&'a ThoughtTemplate>,
}

impl<'a> StepPrompt<'a> {
    pub fn new(observation: &'a GridObservation, summary: &'a FeatureSummary) -> Self {
        Self {
            observation,
            summary,
            template: None,
        }
    }

    /// Inject a retrieved template.
    pub fn with_template(mut self, template: Option<&'a ThoughtTemplate>) -> Self {
        self.template = template;
        self
    }

    fn situation(&self) -> String {
        let s = self.summary;
        let mut block = format!("{SITUATION_HEADER}\n- facing: {}\n", s.facing);
        match (s.goal.position(), s.goal_ahead_right()) {
            (Some(goal), Some((ahead, right))) => {
                let _ = writeln!(block, "- goal: {goal}");
                let _ = writeln!(block, "- goal_ahead: {ahead}");
                let _ = writeln!(block, "- goal_right: {right}");
            }
            _ => block.push_str("- goal: unknown\n"),
        }
        let _ = writeln!(block, "- goal_direction: {}", s.goal_direction());
        let front = s.front().map_or("clear", |k| k.as_str());
        let _ = writeln!(block, "- front: {front}");
        let _ = writeln!(block, "- nearby: {}", s.obstacles_description());
        block
    }
}

impl PromptTemplate for StepPrompt<'_> {
    fn system_prompt(&self) -> Option<String> {
        let actions: Vec<String> = Action::ALL
            .iter()
            .map(|a| format!("- {}: {}", a.token(), a.describe()))
            .collect();

        Some(format!(
            "You are an agent navigating a grid world. Each turn you choose exactly one action.\n\
             Available actions:\n{}\n\
             Answer with one action word and nothing else.",
            actions.join("\n")
        ))
    }

    fn generate(&self) -> String {
        let mut prompt = describe_observation(self.observation);
        prompt.push_str("\n\n");
        prompt.push_str(&self.situation());

        if let Some(template) = self.template {
            let _ = write!(
                prompt,
                "\nThought template \"{}\" ({}):\n{}\n",
                template.name(),
                template.description(),
                template.render(self.summary)
            );
        }

        prompt.push_str("\nWhich action do you take?");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::config::DistillerConfig;
    use bot_core::distiller::ProblemDistiller;
    use bot_core::types::{CellKind, Direction, GoalLocation, GridPos};
    use bot_llm::{situation_int, situation_value};

    fn observation() -> GridObservation {
        GridObservation::new(GridPos::new(3, 3), Direction::North)
            .with_cell(GridPos::new(2, 3), CellKind::Wall)
            .with_cell(GridPos::new(0, 5), CellKind::Goal)
    }

    #[test]
    fn test_situation_block_readable_by_mock() {
        let obs = observation();
        let summary = ProblemDistiller::new(DistillerConfig::default()).distill(&obs);
        let prompt = StepPrompt::new(&obs, &summary).generate();

        assert_eq!(situation_value(&prompt, "facing"), Some("north"));
        assert_eq!(situation_int(&prompt, "goal_ahead"), Some(3));
        assert_eq!(situation_int(&prompt, "goal_right"), Some(2));
        assert_eq!(situation_value(&prompt, "front"), Some("wall"));
        assert!(!prompt.contains("Thought template"));
    }

    #[test]
    fn test_unknown_goal_omits_offsets() {
        let obs = GridObservation::new(GridPos::new(1, 1), Direction::East);
        let summary = ProblemDistiller::new(DistillerConfig::default()).distill(&obs);
        let prompt = StepPrompt::new(&obs, &summary).generate();

        assert_eq!(situation_value(&prompt, "goal"), Some("unknown"));
        assert_eq!(situation_value(&prompt, "goal_ahead"), None);
        assert_eq!(situation_value(&prompt, "front"), Some("clear"));
    }

    #[test]
    fn test_template_section_filled() {
        let obs = observation();
        let summary = ProblemDistiller::new(DistillerConfig::default()).distill(&obs);
        let signature = FeatureSummary::new(GridPos::new(0, 0), Direction::East, GoalLocation::Unknown);
        let template = ThoughtTemplate::new(
            "reach-ahead-right-ep0",
            "Reach a goal",
            "Goal lies {goal_direction}; front {front}.",
            signature,
            0,
        );

        let prompt = StepPrompt::new(&obs, &summary)
            .with_template(Some(&template))
            .generate();
        assert!(prompt.contains("Thought template \"reach-ahead-right-ep0\" (Reach a goal):"));
        assert!(prompt.contains("Goal lies ahead-right; front wall."));
        assert!(prompt.ends_with("Which action do you take?"));
    }

    #[test]
    fn test_system_prompt_lists_actions() {
        let obs = observation();
        let summary = ProblemDistiller::new(DistillerConfig::default()).distill(&obs);
        let system = StepPrompt::new(&obs, &summary).system_prompt().unwrap();
        for action in Action::ALL {
            assert!(system.contains(&format!("- {}:", action.token())));
        }
    }
}
