//! BoTAgent — retrieve a template, prompt the model, parse its answer.
//!
//! ```text
//! EpisodeEnd ─begin_episode─▶ EpisodeStart ─act─▶ AwaitingObservation ─▶ PromptBuilt ─▶ ActionParsed
//!     ▲                                                   ▲                                 │
//!     └──────────────── end_episode ◀─────────────────────┴──────────── act ◀──────────────┘
//! ```

use crate::error::{AgentError, AgentResult};
use crate::parser::ActionParser;
use crate::prompt::StepPrompt;
use bot_core::action::Action;
use bot_core::manager::{BufferManager, ConsolidationOutcome};
use bot_core::trace::{EpisodeTrace, TraceEntry};
use bot_core::types::{FeatureSummary, GridObservation};
use bot_llm::{LlmBackend, PromptTemplate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Action taken when the model's answer cannot be parsed.
    #[serde(default = "default_action")]
    pub default_action: Action,
    /// Step budget per episode used by the runner.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_action() -> Action {
    Action::Forward
}

fn default_max_steps() -> usize {
    64
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_action: default_action(),
            max_steps: default_max_steps(),
        }
    }
}

/// Where the agent is in its decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentState {
    EpisodeStart,
    AwaitingObservation,
    PromptBuilt,
    ActionParsed,
    EpisodeEnd,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentState::EpisodeStart => "episode-start",
            AgentState::AwaitingObservation => "awaiting-observation",
            AgentState::PromptBuilt => "prompt-built",
            AgentState::ActionParsed => "action-parsed",
            AgentState::EpisodeEnd => "episode-end",
        })
    }
}

/// One decision, as returned by [`BoTAgent::act`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// The answer did not parse and the default action was used.
    pub fallback: bool,
    pub template: Option<String>,
    pub score: Option<f64>,
    pub summary: FeatureSummary,
    pub response: String,
    pub tokens_used: u32,
    pub latency: Duration,
}

/// Buffer-of-Thoughts agent.
///
/// The buffer is injected through a [`BufferManager`]; several agents may
/// share clones of one manager.
pub struct BoTAgent {
    manager: BufferManager,
    llm: Arc<dyn LlmBackend>,
    parser: ActionParser,
    config: AgentConfig,
    state: AgentState,
    trace: Option<EpisodeTrace>,
    tokens_used: u64,
}

impl BoTAgent {
    pub fn new(manager: BufferManager, llm: Arc<dyn LlmBackend>, config: AgentConfig) -> Self {
        Self {
            parser: ActionParser::new(config.default_action),
            manager,
            llm,
            config,
            state: AgentState::EpisodeEnd,
            trace: None,
            tokens_used: 0,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn manager(&self) -> &BufferManager {
        &self.manager
    }

    pub fn backend(&self) -> &dyn LlmBackend {
        self.llm.as_ref()
    }

    /// The trace of the episode in progress.
    pub fn trace(&self) -> Option<&EpisodeTrace> {
        self.trace.as_ref()
    }

    /// Tokens consumed across all episodes.
    pub fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    /// Open a new episode and return its index.
    pub fn begin_episode(&mut self) -> AgentResult<u64> {
        if self.state != AgentState::EpisodeEnd {
            return Err(AgentError::InvalidState {
                operation: "begin an episode",
                state: self.state,
            });
        }
        let episode = self.manager.begin_episode()?;
        self.trace = Some(EpisodeTrace::new(episode));
        self.state = AgentState::EpisodeStart;
        debug!(episode, "episode started");
        Ok(episode)
    }

    /// Choose an action for `observation`.
    ///
    /// Opens an episode first if none is in progress. Exactly one LLM query
    /// is issued. An unparseable answer falls back to the configured default
    /// action; an LLM failure is returned and nothing is recorded, so the
    /// call may simply be repeated.
    pub async fn act(&mut self, observation: &GridObservation) -> AgentResult<Decision> {
        if self.state == AgentState::EpisodeEnd {
            self.begin_episode()?;
        }
        self.state = AgentState::AwaitingObservation;

        let selection = self.manager.select(observation)?;
        let template_name = selection.template.as_ref().map(|t| t.name().to_string());

        let prompt = StepPrompt::new(observation, &selection.summary)
            .with_template(selection.template.as_ref());
        let system = prompt.system_prompt().unwrap_or_default();
        let user = prompt.generate();
        self.state = AgentState::PromptBuilt;

        let response = match self.llm.query(&system, &user).await {
            Ok(response) => response,
            Err(e) => {
                warn!(backend = self.llm.name(), error = %e, retryable = e.is_retryable(), "LLM query failed");
                self.state = AgentState::AwaitingObservation;
                return Err(e.into());
            }
        };
        self.tokens_used += u64::from(response.tokens_used);

        let parsed = self.parser.parse(&response.text);
        if parsed.fallback {
            warn!(
                response = %response.text,
                fallback_action = %parsed.action,
                "unparseable answer, using default action"
            );
        }

        let entry = TraceEntry::new(selection.summary.clone(), parsed.action)
            .with_template(template_name.clone())
            .with_parse_fallback(parsed.fallback);
        match self.trace.as_mut() {
            Some(trace) => trace.push(entry),
            None => {
                return Err(AgentError::InvalidState {
                    operation: "record a step",
                    state: self.state,
                })
            }
        }
        self.state = AgentState::ActionParsed;

        debug!(
            action = %parsed.action,
            template = ?template_name,
            tokens = response.tokens_used,
            "action chosen"
        );

        Ok(Decision {
            action: parsed.action,
            fallback: parsed.fallback,
            template: template_name,
            score: selection.score,
            summary: selection.summary,
            response: response.text,
            tokens_used: response.tokens_used,
            latency: response.latency,
        })
    }

    /// Attach the environment's reward to the latest step.
    pub fn record_reward(&mut self, reward: f64) {
        if let Some(trace) = self.trace.as_mut() {
            trace.set_last_reward(reward);
        }
    }

    /// Close the episode: back-fill rewards and hand the trace to the buffer.
    pub fn end_episode(&mut self, success: bool, total_reward: f64) -> AgentResult<ConsolidationOutcome> {
        let Some(mut trace) = self.trace.take() else {
            return Err(AgentError::InvalidState {
                operation: "end an episode",
                state: self.state,
            });
        };
        self.state = AgentState::EpisodeEnd;

        trace.backfill_rewards(total_reward);
        let episode = trace.episode();
        let steps = trace.len();
        let outcome = self.manager.consolidate(trace, success)?;
        info!(episode, success, steps, outcome = ?outcome, "episode finished");
        Ok(outcome)
    }

    /// Close the episode as a failure without back-filling rewards.
    ///
    /// Does nothing when no episode is open.
    pub fn abort_episode(&mut self) -> AgentResult<()> {
        if let Some(trace) = self.trace.take() {
            self.state = AgentState::EpisodeEnd;
            warn!(episode = trace.episode(), steps = trace.len(), "episode aborted");
            self.manager.consolidate(trace, false)?;
        }
        Ok(())
    }
}

impl fmt::Debug for BoTAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoTAgent")
            .field("backend", &self.llm.name())
            .field("state", &self.state)
            .field("config", &self.config)
            .field("tokens_used", &self.tokens_used)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::config::{BufferConfig, DistillerConfig};
    use bot_core::types::{CellKind, Direction, GridPos};
    use bot_llm::{LlmError, MockBackend};

    fn agent(llm: MockBackend) -> BoTAgent {
        let manager = BufferManager::new(BufferConfig::default(), DistillerConfig::default()).unwrap();
        BoTAgent::new(manager, Arc::new(llm), AgentConfig::default())
    }

    fn goal_ahead() -> GridObservation {
        GridObservation::new(GridPos::new(2, 2), Direction::East).with_cell(GridPos::new(2, 5), CellKind::Goal)
    }

    #[tokio::test]
    async fn test_act_follows_state_machine() {
        let mut agent = agent(MockBackend::new());
        assert_eq!(agent.state(), AgentState::EpisodeEnd);

        agent.begin_episode().unwrap();
        assert_eq!(agent.state(), AgentState::EpisodeStart);

        let decision = agent.act(&goal_ahead()).await.unwrap();
        assert_eq!(decision.action, Action::Forward);
        assert_eq!(agent.state(), AgentState::ActionParsed);
        assert!(decision.tokens_used > 0);

        agent.end_episode(false, 0.0).unwrap();
        assert_eq!(agent.state(), AgentState::EpisodeEnd);
        assert!(agent.trace().is_none());
    }

    #[tokio::test]
    async fn test_act_auto_begins_episode() {
        let mut agent = agent(MockBackend::new());
        agent.act(&goal_ahead()).await.unwrap();
        assert_eq!(agent.trace().map(|t| t.len()), Some(1));
    }

    #[tokio::test]
    async fn test_parse_failure_falls_back() {
        let mut agent = agent(MockBackend::new().with_response("Situation", "I refuse to answer"));
        let decision = agent.act(&goal_ahead()).await.unwrap();

        assert!(decision.fallback);
        assert_eq!(decision.action, Action::Forward);
        assert_eq!(agent.trace().unwrap().parse_failures(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_records_nothing() {
        let mut agent = agent(MockBackend::new().with_failures(1));
        agent.begin_episode().unwrap();

        let err = agent.act(&goal_ahead()).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::ConnectionFailed(_))));
        assert!(err.is_retryable());
        assert!(agent.trace().unwrap().is_empty());
        assert_eq!(agent.state(), AgentState::AwaitingObservation);

        agent.act(&goal_ahead()).await.unwrap();
        assert_eq!(agent.trace().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut agent = agent(MockBackend::new());
        assert!(matches!(
            agent.end_episode(true, 1.0),
            Err(AgentError::InvalidState { .. })
        ));
        agent.begin_episode().unwrap();
        assert!(matches!(agent.begin_episode(), Err(AgentError::InvalidState { .. })));
        agent.abort_episode().unwrap();
        assert_eq!(agent.state(), AgentState::EpisodeEnd);
    }
}
