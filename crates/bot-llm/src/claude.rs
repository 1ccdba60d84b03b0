//! Anthropic Messages API backend.
//!
//! Requires the `api` feature and an Anthropic API key.

use crate::backend::{estimate_tokens, LlmBackend, LlmConfig, LlmError, LlmResponse, LlmResult};
use crate::http::{self, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

const HAIKU: &str = "claude-3-haiku-20240307";
const SONNET: &str = "claude-3-5-sonnet-20241022";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: [Turn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesReply {
    /// Concatenated text blocks; `None` when the reply carries no text.
    fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Claude models via the Anthropic API.
pub struct ClaudeBackend {
    api_key: String,
    config: LlmConfig,
    client: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(api_key: &str) -> LlmResult<Self> {
        Self::with_config(api_key, LlmConfig::claude())
    }

    pub fn with_config(api_key: &str, config: LlmConfig) -> LlmResult<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: http::client(&config)?,
            config,
        })
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> LlmResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::AuthenticationFailed)?;
        Self::new(&api_key)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn sonnet(self) -> Self {
        self.with_model(SONNET)
    }

    /// The default: fastest and cheapest per step.
    pub fn haiku(self) -> Self {
        self.with_model(HAIKU)
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn query(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<LlmResponse> {
        let started = Instant::now();
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system_prompt,
            messages: [Turn {
                role: "user",
                content: user_prompt,
            }],
        };
        let request = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let reply: MessagesReply =
            http::send_json(request, Target::new("claude", MESSAGES_URL, &self.config)).await?;
        let text = reply
            .text()
            .ok_or_else(|| LlmError::InvalidResponse("claude: no text content".to_string()))?;

        let tokens_used = match &reply.usage {
            Some(usage) => usage.input_tokens + usage.output_tokens,
            None => estimate_tokens(&[system_prompt, user_prompt, &text]),
        };
        debug!(model = %self.config.model, tokens_used, "claude reply");

        Ok(LlmResponse {
            text,
            tokens_used,
            latency: started.elapsed(),
        })
    }
}
