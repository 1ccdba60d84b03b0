//! # BoT Agent
//!
//! The Buffer-of-Thoughts decision loop.
//!
//! Each step the [`BoTAgent`](agent::BoTAgent) distills the observation,
//! retrieves the closest thought template from the shared buffer, asks the
//! LLM for one action and parses the answer. When the episode ends, the
//! trace is consolidated back into the buffer.
//!
//! ## Quick Start
//!
//! ```rust
//! use bot_agent::prelude::*;
//! use std::sync::Arc;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let manager = BufferManager::new(BufferConfig::default(), DistillerConfig::default()).unwrap();
//! let mut agent = BoTAgent::new(manager, Arc::new(MockBackend::new()), AgentConfig::default());
//!
//! let mut world = GridWorld::new(7, 7, GridPos::new(1, 1), Direction::East, GridPos::new(1, 5)).unwrap();
//! let metrics = rt
//!     .block_on(run_episode(&mut agent, &mut world, 20, &RetryPolicy::none()))
//!     .unwrap();
//! assert!(metrics.success);
//! assert_eq!(metrics.steps, 4);
//! ```

pub mod agent;
pub mod env;
pub mod error;
pub mod grid;
pub mod parser;
pub mod prompt;
pub mod runner;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::agent::{AgentConfig, AgentState, BoTAgent, Decision};
    pub use crate::env::{describe_observation, Environment, StepInfo, StepOutcome, Termination};
    pub use crate::error::{AgentError, AgentResult};
    pub use crate::grid::GridWorld;
    pub use crate::parser::{ActionParser, ParsedAction};
    pub use crate::prompt::StepPrompt;
    pub use crate::runner::{run_episode, run_experiment, EpisodeMetrics, ExperimentSummary, RetryPolicy};

    pub use bot_core::prelude::*;
    pub use bot_llm::{LlmBackend, LlmConfig, LlmError, MockBackend};
}
