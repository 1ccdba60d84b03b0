//! Chat Completions backend for OpenAI and compatible servers
//! (vLLM, llama.cpp server, Azure OpenAI).
//!
//! Requires the `api` feature.

use crate::backend::{estimate_tokens, LlmBackend, LlmConfig, LlmError, LlmResponse, LlmResult};
use crate::http::{self, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn new(config: &'a LlmConfig, system: &'a str, user: &'a str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });
        Self {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// GPT models, or any server speaking the Chat Completions protocol.
pub struct OpenAiBackend {
    api_key: String,
    config: LlmConfig,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str) -> LlmResult<Self> {
        Self::with_config(api_key, LlmConfig::openai())
    }

    pub fn with_config(api_key: &str, config: LlmConfig) -> LlmResult<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: http::client(&config)?,
            config,
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
        })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env() -> LlmResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::AuthenticationFailed)?;
        Self::new(&api_key)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    /// Point at a compatible server instead of api.openai.com.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn query(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<LlmResponse> {
        let started = Instant::now();
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::new(&self.config, system_prompt, user_prompt));

        let reply: ChatReply =
            http::send_json(request, Target::new("openai", &self.endpoint, &self.config)).await?;
        let usage = reply.usage;
        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("openai: no choices in reply".to_string()))?;

        let tokens_used = match usage {
            Some(usage) => usage.total_tokens,
            None => estimate_tokens(&[system_prompt, user_prompt, &text]),
        };
        debug!(model = %self.config.model, tokens_used, "openai reply");

        Ok(LlmResponse {
            text,
            tokens_used,
            latency: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"right"}}],
                       "usage":{"prompt_tokens":40,"completion_tokens":1,"total_tokens":41}}"#;
        let reply: ChatReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.choices[0].message.content.as_deref(), Some("right"));
        assert_eq!(reply.usage.unwrap().total_tokens, 41);
    }

    #[test]
    fn test_system_message_only_when_present() {
        let config = LlmConfig::openai();
        assert_eq!(ChatRequest::new(&config, "", "go").messages.len(), 1);
        let request = ChatRequest::new(&config, "act", "go");
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "go");
    }

    #[test]
    fn test_custom_endpoint() {
        let backend = OpenAiBackend::new("sk-test")
            .unwrap()
            .with_endpoint("http://localhost:8000/v1/chat/completions");
        assert_eq!(backend.endpoint, "http://localhost:8000/v1/chat/completions");
        assert_eq!(backend.name(), "openai");
    }
}
