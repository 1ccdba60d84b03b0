//! Ollama backend for local inference.
//!
//! Requires the `local` feature and a running Ollama server.

use crate::backend::{estimate_tokens, LlmBackend, LlmConfig, LlmError, LlmResponse, LlmResult};
use crate::http::{self, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

pub(crate) const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl GenerateReply {
    fn reported_tokens(&self) -> Option<u32> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(prompt.unwrap_or(0) + completion.unwrap_or(0)),
        }
    }
}

/// Local models served by Ollama's `/api/generate`.
///
/// ```rust,ignore
/// let backend = OllamaBackend::localhost()?.with_model("qwen2.5");
/// let reply = backend.query(system, user).await?;
/// ```
pub struct OllamaBackend {
    endpoint: String,
    config: LlmConfig,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(endpoint: &str) -> LlmResult<Self> {
        Self::with_config(endpoint, LlmConfig::ollama())
    }

    pub fn with_config(endpoint: &str, config: LlmConfig) -> LlmResult<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: http::client(&config)?,
            config,
        })
    }

    /// Ollama on its default port.
    pub fn localhost() -> LlmResult<Self> {
        Self::new(DEFAULT_ENDPOINT)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn query(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<LlmResponse> {
        let started = Instant::now();
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: &self.config.model,
            prompt: user_prompt,
            system: system_prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let reply: GenerateReply = http::send_json(
            self.client.post(&url).json(&body),
            Target::new("ollama", &url, &self.config),
        )
        .await
        .map_err(|e| match e {
            LlmError::ModelNotFound(model) => {
                LlmError::ModelNotFound(format!("{model} (run: ollama pull {model})"))
            }
            other => other,
        })?;

        let tokens_used = reply
            .reported_tokens()
            .unwrap_or_else(|| estimate_tokens(&[system_prompt, user_prompt, &reply.response]));
        debug!(model = %self.config.model, tokens_used, "ollama reply");

        Ok(LlmResponse {
            text: reply.response,
            tokens_used,
            latency: started.elapsed(),
        })
    }

    async fn health_check(&self) -> LlmResult<bool> {
        let url = format!("{}/api/tags", self.endpoint);
        Ok(self
            .client
            .get(&url)
            .send()
            .await
            .is_ok_and(|resp| resp.status().is_success()))
    }
}
