//! End-to-end runs of the agent against GridWorld with the mock backend.

use bot_agent::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn manager() -> BufferManager {
    BufferManager::new(BufferConfig::default(), DistillerConfig::default()).unwrap()
}

fn agent_with(manager: BufferManager, llm: MockBackend) -> BoTAgent {
    BoTAgent::new(manager, Arc::new(llm), AgentConfig::default())
}

/// 7x7 room, agent at (1,1) facing east, goal four cells ahead.
fn corridor() -> GridWorld {
    GridWorld::new(7, 7, GridPos::new(1, 1), Direction::East, GridPos::new(1, 5)).unwrap()
}

#[tokio::test]
async fn mock_goal_directly_ahead_moves_forward() {
    let mut agent = agent_with(manager(), MockBackend::new());
    let obs = GridObservation::new(GridPos::new(2, 2), Direction::North)
        .with_cell(GridPos::new(0, 2), CellKind::Goal);

    let decision = agent.act(&obs).await.unwrap();

    assert_eq!(decision.action, Action::Forward);
    assert!(!decision.fallback);
    assert_eq!(decision.response, "forward");
    let trace = agent.trace().unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace.entries()[0].action, Action::Forward);
    assert_eq!(trace.entries()[0].reward, None);
}

#[tokio::test]
async fn successful_episode_mints_then_reuses_template() {
    let m = manager();
    let mut agent = agent_with(m.clone(), MockBackend::new());
    let retry = RetryPolicy::none();

    let first = run_episode(&mut agent, &mut corridor(), 20, &retry).await.unwrap();
    assert!(first.success);
    assert_eq!(first.steps, 4);
    assert_eq!(first.termination, Termination::Goal);
    assert!(first.template_used.is_none());
    let ConsolidationOutcome::Inserted { name, .. } = first.outcome else {
        panic!("expected a new template, got {:?}", first.outcome);
    };

    let second = run_episode(&mut agent, &mut corridor(), 20, &retry).await.unwrap();
    assert!(second.success);
    assert_eq!(second.template_used.as_deref(), Some(name.as_str()));
    assert_eq!(
        second.outcome,
        ConsolidationOutcome::Reinforced {
            name: name.clone(),
            usage_count: 2
        }
    );
    assert_eq!(m.len().unwrap(), 1);
    assert!(second.tokens > first.tokens, "template text adds prompt tokens");
}

#[tokio::test]
async fn failed_episode_leaves_buffer_untouched() {
    let m = manager();
    let mut agent = agent_with(m.clone(), MockBackend::new().with_response("Situation", "forward"));
    let mut world = corridor().with_cell(GridPos::new(1, 3), CellKind::Lava).unwrap();

    let metrics = run_episode(&mut agent, &mut world, 20, &RetryPolicy::none()).await.unwrap();

    assert!(!metrics.success);
    assert_eq!(metrics.steps, 2);
    assert_eq!(metrics.termination, Termination::Lava);
    assert_eq!(metrics.outcome, ConsolidationOutcome::Discarded);
    assert!(m.is_empty().unwrap());
    assert_eq!(agent.state(), AgentState::EpisodeEnd);
}

#[tokio::test]
async fn step_budget_ends_episode_as_failure() {
    let m = manager();
    let mut agent = agent_with(m.clone(), MockBackend::new().with_response("Situation", "left"));

    let metrics = run_episode(&mut agent, &mut corridor(), 5, &RetryPolicy::none()).await.unwrap();

    assert!(!metrics.success);
    assert_eq!(metrics.steps, 5);
    assert_eq!(metrics.termination, Termination::StepLimit);
    assert!(m.is_empty().unwrap());
}

#[tokio::test]
async fn unparseable_answers_are_counted() {
    let mut agent = agent_with(manager(), MockBackend::new().with_response("Situation", "hmm"));

    let metrics = run_episode(&mut agent, &mut corridor(), 20, &RetryPolicy::none()).await.unwrap();

    // Default action is forward, which walks straight into the goal.
    assert!(metrics.success);
    assert_eq!(metrics.parse_failures, 4);
}

#[tokio::test]
async fn transient_llm_failures_are_retried() {
    let mut agent = agent_with(manager(), MockBackend::new().with_failures(2));
    let retry = RetryPolicy::new(3, Duration::ZERO);

    let metrics = run_episode(&mut agent, &mut corridor(), 20, &retry).await.unwrap();

    assert!(metrics.success);
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.steps, 4);
}

#[tokio::test]
async fn exhausted_retries_abort_the_episode() {
    let m = manager();
    let mut agent = agent_with(m.clone(), MockBackend::new().with_failures(5));
    let retry = RetryPolicy::new(1, Duration::ZERO);

    let err = run_episode(&mut agent, &mut corridor(), 20, &retry).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(agent.state(), AgentState::EpisodeEnd);
    assert!(m.is_empty().unwrap());
    assert_eq!(m.stats().unwrap().discarded, 1);
}

/// Fails on the first step after reset.
struct BrokenEnv(GridWorld);

impl Environment for BrokenEnv {
    fn reset(&mut self) -> AgentResult<GridObservation> {
        self.0.reset()
    }

    fn step(&mut self, _action: Action) -> AgentResult<StepOutcome> {
        Err(AgentError::Environment("simulator crashed".to_string()))
    }
}

#[tokio::test]
async fn environment_error_is_returned_after_abort() {
    let m = manager();
    let mut agent = agent_with(m.clone(), MockBackend::new());

    let err = run_episode(&mut agent, &mut BrokenEnv(corridor()), 20, &RetryPolicy::none())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Environment(ref msg) if msg == "simulator crashed"));
    assert_eq!(agent.state(), AgentState::EpisodeEnd);
    assert_eq!(m.stats().unwrap().discarded, 1);
    assert!(m.is_empty().unwrap());
}

#[tokio::test]
async fn wall_between_start_and_goal_is_walked_around() {
    let mut agent = agent_with(manager(), MockBackend::new());
    let mut world = corridor().with_cell(GridPos::new(1, 3), CellKind::Wall).unwrap();

    let metrics = run_episode(&mut agent, &mut world, 40, &RetryPolicy::none()).await.unwrap();

    assert!(metrics.success, "terminated by {}", metrics.termination);
    assert_eq!(metrics.termination, Termination::Goal);
    assert_eq!(metrics.steps, 9);
}

#[tokio::test]
async fn success_survives_eviction_of_its_template() {
    let m = BufferManager::new(BufferConfig::default().with_capacity(1), DistillerConfig::default()).unwrap();
    let mut a = agent_with(m.clone(), MockBackend::new());
    let mut b = agent_with(m.clone(), MockBackend::new());

    let goal_ahead = GridObservation::new(GridPos::new(3, 3), Direction::North)
        .with_cell(GridPos::new(1, 3), CellKind::Goal);
    let goal_behind = GridObservation::new(GridPos::new(9, 3), Direction::South)
        .with_cell(GridPos::new(1, 3), CellKind::Goal);

    a.act(&goal_ahead).await.unwrap();
    a.end_episode(true, 1.0).unwrap();
    assert!(m.get("reach-ahead-ep0").is_ok());

    let decision = a.act(&goal_ahead).await.unwrap();
    assert_eq!(decision.template.as_deref(), Some("reach-ahead-ep0"));

    assert!(b.act(&goal_behind).await.unwrap().template.is_none());
    let outcome = b.end_episode(true, 1.0).unwrap();
    assert_eq!(
        outcome,
        ConsolidationOutcome::Inserted {
            name: "reach-behind-ep2".into(),
            evicted: Some("reach-ahead-ep0".into())
        }
    );

    let outcome = a.end_episode(true, 1.0).unwrap();
    assert_eq!(
        outcome,
        ConsolidationOutcome::Inserted {
            name: "reach-ahead-ep1".into(),
            evicted: Some("reach-behind-ep2".into())
        }
    );
    assert_eq!(m.len().unwrap(), 1);
    assert_eq!(m.stats().unwrap().reinforced, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_agents_share_one_buffer() {
    let m = manager();
    let agents = 4;

    let handles: Vec<_> = (0..agents)
        .map(|_| {
            let mut agent = agent_with(m.clone(), MockBackend::new());
            tokio::spawn(async move {
                run_episode(&mut agent, &mut corridor(), 20, &RetryPolicy::none()).await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().success);
    }

    let templates = m.templates().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].usage_count(), agents as u64);
}

#[tokio::test]
async fn experiment_over_random_rooms() {
    let m = manager();
    let mut agent = agent_with(m.clone(), MockBackend::new());

    let metrics = run_experiment(&mut agent, 8, 40, &RetryPolicy::none(), |i| {
        GridWorld::random(8, 100 + i as u64)
    })
    .await
    .unwrap();

    assert_eq!(metrics.len(), 8);
    for (i, episode) in metrics.iter().enumerate() {
        assert_eq!(episode.episode, i as u64);
        assert!(episode.steps <= 40);
        assert_eq!(episode.outcome == ConsolidationOutcome::Discarded, !episode.success);
    }

    let summary = ExperimentSummary::from_metrics(&metrics);
    assert_eq!(summary.episodes, 8);
    assert_eq!(summary.successes, metrics.iter().filter(|e| e.success).count());
    assert_eq!(m.len().unwrap(), summary.templates_minted);
    assert!((0.0..=1.0).contains(&summary.success_rate));
}
