//! The backend trait, its error type and request settings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures of a model query.
///
/// [`is_retryable`](LlmError::is_retryable) separates transient transport
/// problems from errors that will recur on every attempt.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The prompt exceeds the model's context window; carries the provider's message.
    #[error("Context too long: {0}")]
    ContextTooLong(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Timeout after {0} seconds")]
    Timeout(u32),

    #[error("Backend unavailable: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ConnectionFailed(_) | LlmError::RateLimited(_) | LlmError::Timeout(_)
        )
    }

    /// Suggested wait before retrying, when the provider told us.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited(secs) => Some(Duration::from_secs(*secs as u64)),
            _ => None,
        }
    }
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Request settings shared by all backends.
///
/// Defaults suit the agent loop: answers are a single action word, so
/// `max_tokens` is small and sampling is greedy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    /// 0.0 is greedy decoding; clamped to 0.0..=2.0.
    pub temperature: f32,
    pub timeout_secs: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::for_model("default")
    }
}

impl LlmConfig {
    fn for_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: 64,
            temperature: 0.0,
            timeout_secs: 30,
        }
    }

    pub fn claude() -> Self {
        Self::for_model("claude-3-haiku-20240307")
    }

    pub fn openai() -> Self {
        Self::for_model("gpt-4o-mini")
    }

    /// Local models get a longer timeout; the first query may load weights.
    pub fn ollama() -> Self {
        Self::for_model("llama3.2").with_timeout(120)
    }

    pub fn mock() -> Self {
        Self::for_model("rule-based")
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A completion together with its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub tokens_used: u32,
    pub latency: Duration,
}

impl LlmResponse {
    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }
}

/// One language model, whatever serves it.
///
/// The agent issues exactly one `query` per decision; it is the only call
/// in the loop that may block on the network or fail transiently.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short identifier, e.g. `"ollama"`.
    fn name(&self) -> &str;

    fn config(&self) -> &LlmConfig;

    /// Send one system + user prompt pair and return the completion.
    async fn query(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<LlmResponse>;

    /// Whether the backend answers at all.
    ///
    /// The default sends a tiny query. Only unreachable servers and rejected
    /// credentials count as unhealthy; any other error still proves the
    /// backend is up.
    async fn health_check(&self) -> LlmResult<bool> {
        match self.query("Reply with: ok", "ping").await {
            Ok(_) => Ok(true),
            Err(LlmError::ConnectionFailed(_) | LlmError::AuthenticationFailed | LlmError::Timeout(_)) => Ok(false),
            Err(_) => Ok(true),
        }
    }
}

/// Rough token estimate for backends that do not report usage.
pub(crate) fn estimate_tokens(texts: &[&str]) -> u32 {
    texts
        .iter()
        .map(|t| t.split_whitespace().count() as u32)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let claude = LlmConfig::claude();
        assert!(claude.model.contains("claude"));

        let openai = LlmConfig::openai();
        assert!(openai.model.contains("gpt"));

        let ollama = LlmConfig::ollama().with_temperature(5.0);
        assert!(ollama.model.contains("llama"));
        assert_eq!(ollama.temperature, 2.0);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout(30).is_retryable());
        assert!(LlmError::ConnectionFailed("down".into()).is_retryable());
        assert!(LlmError::RateLimited(5).is_retryable());
        assert_eq!(LlmError::RateLimited(5).retry_after(), Some(Duration::from_secs(5)));
        assert!(!LlmError::AuthenticationFailed.is_retryable());
        assert!(!LlmError::InvalidResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(&["a b c", "", "d"]), 4);
    }
}
