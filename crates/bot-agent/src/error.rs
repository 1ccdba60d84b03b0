//! Agent error types.

use crate::agent::AgentState;
use bot_core::error::BufferError;
use bot_llm::LlmError;
use std::time::Duration;
use thiserror::Error;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors surfaced by the agent loop and the episode runner.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The LLM call failed. No action was taken.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Invalid agent state: cannot {operation} while in {state}")]
    InvalidState {
        operation: &'static str,
        state: AgentState,
    },
}

impl AgentError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Llm(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AgentError::Llm(e) => e.retry_after(),
            _ => None,
        }
    }
}
