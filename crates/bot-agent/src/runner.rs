//! Episode runner and experiment metrics.

use crate::agent::{BoTAgent, Decision};
use crate::env::{Environment, Termination};
use crate::error::AgentResult;
use bot_core::manager::ConsolidationOutcome;
use bot_core::types::GridObservation;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Exponential backoff for retryable LLM failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }
}

/// Per-episode measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeMetrics {
    pub episode: u64,
    pub success: bool,
    pub steps: usize,
    pub tokens: u64,
    pub elapsed: Duration,
    pub template_used: Option<String>,
    pub parse_failures: usize,
    pub retries: u32,
    pub total_reward: f64,
    pub termination: Termination,
    /// What consolidation did with the episode.
    pub outcome: ConsolidationOutcome,
}

/// Aggregate over a run of episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub episodes: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub mean_steps: f64,
    pub mean_tokens: f64,
    pub mean_elapsed: Duration,
    /// Episodes that ran with at least one retrieved template.
    pub template_episodes: usize,
    pub parse_failures: usize,
    pub templates_minted: usize,
}

impl ExperimentSummary {
    pub fn from_metrics(metrics: &[EpisodeMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }
        let n = metrics.len();
        let successes = metrics.iter().filter(|m| m.success).count();
        let total_elapsed: Duration = metrics.iter().map(|m| m.elapsed).sum();

        Self {
            episodes: n,
            successes,
            success_rate: successes as f64 / n as f64,
            mean_steps: metrics.iter().map(|m| m.steps as f64).sum::<f64>() / n as f64,
            mean_tokens: metrics.iter().map(|m| m.tokens as f64).sum::<f64>() / n as f64,
            mean_elapsed: total_elapsed / n as u32,
            template_episodes: metrics.iter().filter(|m| m.template_used.is_some()).count(),
            parse_failures: metrics.iter().map(|m| m.parse_failures).sum(),
            templates_minted: metrics
                .iter()
                .filter(|m| matches!(m.outcome, ConsolidationOutcome::Inserted { .. }))
                .count(),
        }
    }
}

async fn act_with_retry(
    agent: &mut BoTAgent,
    observation: &GridObservation,
    retry: &RetryPolicy,
    retries: &mut u32,
) -> AgentResult<Decision> {
    let mut attempt = 0;
    loop {
        match agent.act(observation).await {
            Ok(decision) => return Ok(decision),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = e
                    .retry_after()
                    .unwrap_or_else(|| retry.backoff(attempt))
                    .min(retry.max_backoff);
                warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "retrying LLM query");
                tokio::time::sleep(delay).await;
                attempt += 1;
                *retries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Drive one episode to completion or `max_steps`.
///
/// An error aborts the episode; the buffer then treats it as a failure.
pub async fn run_episode<E: Environment>(
    agent: &mut BoTAgent,
    env: &mut E,
    max_steps: usize,
    retry: &RetryPolicy,
) -> AgentResult<EpisodeMetrics> {
    let started = Instant::now();
    let episode = agent.begin_episode()?;

    let mut retries = 0;
    match drive(agent, env, max_steps, retry, &mut retries).await {
        Ok(run) => {
            let trace = agent.trace();
            let template_used = trace.and_then(|t| t.template_used()).map(String::from);
            let parse_failures = trace.map_or(0, |t| t.parse_failures());
            let steps = trace.map_or(0, |t| t.len());

            let outcome = agent.end_episode(run.success, run.total_reward)?;
            let metrics = EpisodeMetrics {
                episode,
                success: run.success,
                steps,
                tokens: run.tokens,
                elapsed: started.elapsed(),
                template_used,
                parse_failures,
                retries,
                total_reward: run.total_reward,
                termination: run.termination,
                outcome,
            };
            info!(
                episode,
                success = metrics.success,
                steps,
                tokens = metrics.tokens,
                termination = %metrics.termination,
                "episode metrics"
            );
            Ok(metrics)
        }
        Err(e) => {
            if let Err(abort_error) = agent.abort_episode() {
                warn!(episode, error = %abort_error, "failed to abort episode");
            }
            Err(e)
        }
    }
}

struct Run {
    success: bool,
    total_reward: f64,
    tokens: u64,
    termination: Termination,
}

async fn drive<E: Environment>(
    agent: &mut BoTAgent,
    env: &mut E,
    max_steps: usize,
    retry: &RetryPolicy,
    retries: &mut u32,
) -> AgentResult<Run> {
    let mut observation = env.reset()?;
    let mut run = Run {
        success: false,
        total_reward: 0.0,
        tokens: 0,
        termination: Termination::StepLimit,
    };

    for _ in 0..max_steps {
        let decision = act_with_retry(agent, &observation, retry, retries).await?;
        run.tokens += u64::from(decision.tokens_used);

        let outcome = env.step(decision.action)?;
        agent.record_reward(outcome.reward);
        run.total_reward += outcome.reward;
        observation = outcome.observation;

        if outcome.done {
            run.success = outcome.info.success;
            run.termination = outcome.info.termination.unwrap_or(Termination::StepLimit);
            break;
        }
    }
    Ok(run)
}

/// Run `episodes` episodes, building each environment with `make_env(i)`.
pub async fn run_experiment<E, F>(
    agent: &mut BoTAgent,
    episodes: usize,
    max_steps: usize,
    retry: &RetryPolicy,
    mut make_env: F,
) -> AgentResult<Vec<EpisodeMetrics>>
where
    E: Environment,
    F: FnMut(usize) -> AgentResult<E>,
{
    let mut metrics = Vec::with_capacity(episodes);
    for i in 0..episodes {
        let mut env = make_env(i)?;
        metrics.push(run_episode(agent, &mut env, max_steps, retry).await?);
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), policy.max_backoff);
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = ExperimentSummary::from_metrics(&[]);
        assert_eq!(summary.episodes, 0);
        assert_eq!(summary.success_rate, 0.0);
    }
}
