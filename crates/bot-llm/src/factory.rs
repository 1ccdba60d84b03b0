//! Backend selection by name.

use crate::backend::{LlmBackend, LlmConfig, LlmError, LlmResult};
use crate::mock::MockBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mock,
    Ollama,
    OpenAi,
    Claude,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Mock => "mock",
            BackendKind::Ollama => "ollama",
            BackendKind::OpenAi => "openai",
            BackendKind::Claude => "claude",
        }
    }

    /// Default request settings for this backend.
    pub fn default_config(self) -> LlmConfig {
        match self {
            BackendKind::Mock => LlmConfig::mock(),
            BackendKind::Ollama => LlmConfig::ollama(),
            BackendKind::OpenAi => LlmConfig::openai(),
            BackendKind::Claude => LlmConfig::claude(),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(BackendKind::Mock),
            "ollama" => Ok(BackendKind::Ollama),
            "openai" => Ok(BackendKind::OpenAi),
            "claude" | "anthropic" => Ok(BackendKind::Claude),
            other => Err(LlmError::Unsupported(format!("unknown backend '{other}'"))),
        }
    }
}

/// Construct a backend.
///
/// `endpoint` overrides the Ollama URL or the OpenAI-compatible API URL.
/// API keys are read from `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`.
pub fn build_backend(
    kind: BackendKind,
    config: LlmConfig,
    endpoint: Option<&str>,
) -> LlmResult<Box<dyn LlmBackend>> {
    match kind {
        BackendKind::Mock => Ok(Box::new(MockBackend::new())),
        BackendKind::Ollama => build_ollama(config, endpoint),
        BackendKind::OpenAi => build_openai(config, endpoint),
        BackendKind::Claude => build_claude(config),
    }
}

#[cfg(feature = "local")]
fn build_ollama(config: LlmConfig, endpoint: Option<&str>) -> LlmResult<Box<dyn LlmBackend>> {
    let endpoint = endpoint.unwrap_or(crate::ollama::DEFAULT_ENDPOINT);
    Ok(Box::new(crate::ollama::OllamaBackend::with_config(endpoint, config)?))
}

#[cfg(not(feature = "local"))]
fn build_ollama(_config: LlmConfig, _endpoint: Option<&str>) -> LlmResult<Box<dyn LlmBackend>> {
    Err(LlmError::Unsupported(
        "ollama backend requires the `local` feature".to_string(),
    ))
}

#[cfg(feature = "api")]
fn build_openai(config: LlmConfig, endpoint: Option<&str>) -> LlmResult<Box<dyn LlmBackend>> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::AuthenticationFailed)?;
    let mut backend = crate::openai::OpenAiBackend::with_config(&api_key, config)?;
    if let Some(endpoint) = endpoint {
        backend = backend.with_endpoint(endpoint);
    }
    Ok(Box::new(backend))
}

#[cfg(not(feature = "api"))]
fn build_openai(_config: LlmConfig, _endpoint: Option<&str>) -> LlmResult<Box<dyn LlmBackend>> {
    Err(LlmError::Unsupported(
        "openai backend requires the `api` feature".to_string(),
    ))
}

#[cfg(feature = "api")]
fn build_claude(config: LlmConfig) -> LlmResult<Box<dyn LlmBackend>> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::AuthenticationFailed)?;
    Ok(Box::new(crate::claude::ClaudeBackend::with_config(&api_key, config)?))
}

#[cfg(not(feature = "api"))]
fn build_claude(_config: LlmConfig) -> LlmResult<Box<dyn LlmBackend>> {
    Err(LlmError::Unsupported(
        "claude backend requires the `api` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("Mock".parse::<BackendKind>().unwrap(), BackendKind::Mock);
        assert_eq!("anthropic".parse::<BackendKind>().unwrap(), BackendKind::Claude);
        assert_eq!(BackendKind::OpenAi.to_string(), "openai");
        assert!(matches!(
            "gpt".parse::<BackendKind>(),
            Err(LlmError::Unsupported(_))
        ));
    }

    #[test]
    fn test_build_mock() {
        let backend = build_backend(BackendKind::Mock, LlmConfig::mock(), None).unwrap();
        assert_eq!(backend.name(), "mock");
    }

    #[cfg(not(feature = "local"))]
    #[test]
    fn test_ollama_needs_feature() {
        let err = build_backend(BackendKind::Ollama, LlmConfig::ollama(), None).err();
        assert!(matches!(err, Some(LlmError::Unsupported(_))));
    }
}
