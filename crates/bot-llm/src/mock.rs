//! Deterministic, rule-based backend for tests and offline runs.

use crate::backend::{estimate_tokens, LlmBackend, LlmConfig, LlmError, LlmResponse, LlmResult};
use crate::prompt::{situation_int, situation_value};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Mock backend for testing.
///
/// Without canned responses it plays a greedy navigator: it reads the
/// `Situation:` block of the user prompt and picks the obvious move toward
/// the goal. It never touches the network.
#[derive(Debug)]
pub struct MockBackend {
    config: LlmConfig,
    responses: Vec<(String, String)>,
    failures: AtomicUsize,
    queries: AtomicU64,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self {
            config: LlmConfig::mock(),
            responses: Vec::new(),
            failures: AtomicUsize::new(0),
            queries: AtomicU64::new(0),
        }
    }

    /// Add a canned response for a prompt pattern.
    ///
    /// Patterns are checked in registration order against the user prompt.
    pub fn with_response(mut self, pattern: &str, response: &str) -> Self {
        self.responses.push((pattern.to_string(), response.to_string()));
        self
    }

    /// Fail the next `n` queries with a connection error.
    pub fn with_failures(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    /// Number of queries answered or failed so far.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    fn canned(&self, prompt: &str) -> Option<&str> {
        self.responses
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, response)| response.as_str())
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// The greedy rule set.
fn decide(prompt: &str) -> &'static str {
    let front_clear = situation_value(prompt, "front").map_or(true, |f| f == "clear");
    let goal = situation_int(prompt, "goal_ahead").zip(situation_int(prompt, "goal_right"));

    match goal {
        None if front_clear => "forward",
        None => "right",
        Some((0, 0)) => "done",
        Some((ahead, _)) if ahead > 0 && front_clear => "forward",
        // Blocked with the goal ahead: sidestep toward the goal's side.
        Some((ahead, right)) if ahead > 0 => {
            if right < 0 {
                "left"
            } else {
                "right"
            }
        }
        // Goal abeam and not adjacent: keep moving to get past the blocker.
        Some((0, right)) if right.abs() > 1 && front_clear => "forward",
        Some((_, right)) if right > 0 => "right",
        Some(_) => "left",
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn query(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<LlmResponse> {
        let started = Instant::now();
        self.queries.fetch_add(1, Ordering::SeqCst);

        if self.take_failure() {
            return Err(LlmError::ConnectionFailed("mock connection refused".to_string()));
        }

        let text = match self.canned(user_prompt) {
            Some(response) => response.to_string(),
            None => decide(user_prompt).to_string(),
        };

        Ok(LlmResponse {
            tokens_used: estimate_tokens(&[system_prompt, user_prompt, &text]),
            text,
            latency: started.elapsed(),
        })
    }

    async fn health_check(&self) -> LlmResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn situation(ahead: i32, right: i32, front: &str) -> String {
        format!("Situation:\n- goal_ahead: {ahead}\n- goal_right: {right}\n- front: {front}\n")
    }

    #[tokio::test]
    async fn test_mock_canned_response() {
        let backend = MockBackend::new().with_response("test", "Test response");

        let response = backend.query("", "This is a test").await.unwrap();
        assert_eq!(response.text, "Test response");
        assert_eq!(response.tokens_used, 6);
    }

    #[tokio::test]
    async fn test_mock_rules() {
        let backend = MockBackend::new();
        let cases = [
            (situation(2, 0, "clear"), "forward"),
            (situation(3, 2, "clear"), "forward"),
            (situation(3, 0, "wall"), "right"),
            (situation(3, -2, "lava"), "left"),
            (situation(0, 1, "clear"), "right"),
            (situation(0, 2, "clear"), "forward"),
            (situation(0, -3, "clear"), "forward"),
            (situation(0, -3, "wall"), "left"),
            (situation(-1, -4, "clear"), "left"),
            (situation(-3, 0, "clear"), "left"),
            (situation(0, 0, "clear"), "done"),
            ("Situation:\n- goal: unknown\n- front: clear\n".to_string(), "forward"),
            ("Situation:\n- goal: unknown\n- front: wall\n".to_string(), "right"),
        ];
        for (prompt, expected) in cases {
            let response = backend.query("sys", &prompt).await.unwrap();
            assert_eq!(response.text, expected, "prompt: {prompt}");
        }
        assert_eq!(backend.queries(), 13);
    }

    #[tokio::test]
    async fn test_mock_injected_failures() {
        let backend = MockBackend::new().with_failures(2);
        let prompt = situation(1, 0, "clear");

        assert!(backend.query("", &prompt).await.unwrap_err().is_retryable());
        assert!(backend.query("", &prompt).await.is_err());
        assert_eq!(backend.query("", &prompt).await.unwrap().text, "forward");
    }
}
