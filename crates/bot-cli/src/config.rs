//! Configuration management for the bot CLI.

use anyhow::{Context, Result};
use bot_agent::agent::AgentConfig;
use bot_agent::runner::RetryPolicy;
use bot_core::config::{BufferConfig, DistillerConfig};
use bot_llm::{BackendKind, LlmConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "bot.toml";
const DATA_DIR: &str = ".bot";

/// Project configuration, read from `bot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub distiller: DistillerConfig,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub env: EnvSection,
    #[serde(default)]
    pub retry: RetrySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub backend: BackendKind,
    /// Overrides the backend's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ollama URL or OpenAI-compatible API URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    /// Overrides the backend's default request timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSection {
    /// Side length of the generated rooms, walls included.
    #[serde(default = "default_size")]
    pub size: i32,
    /// Step limit enforced by the room itself.
    #[serde(default = "default_env_max_steps")]
    pub max_steps: usize,
    /// Full view when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_radius: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

// Default value functions
fn default_max_tokens() -> u32 { 64 }
fn default_size() -> i32 { 8 }
fn default_env_max_steps() -> usize { 100 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 8_000 }

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: None,
            endpoint: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: None,
        }
    }
}

impl Default for EnvSection {
    fn default() -> Self {
        Self {
            size: default_size(),
            max_steps: default_env_max_steps(),
            view_radius: None,
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl LlmSection {
    /// Request settings for `kind`, with this section's overrides applied.
    pub fn to_llm_config(&self, kind: BackendKind) -> LlmConfig {
        let mut config = kind
            .default_config()
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(timeout) = self.timeout_secs {
            config = config.with_timeout(timeout);
        }
        config
    }
}

impl RetrySection {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

impl Config {
    /// Load config from bot.toml in the current or parent directories.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config
            .buffer
            .validate()
            .with_context(|| format!("Invalid [buffer] section in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Find bot.toml in current or parent directories.
fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Get the data directory (.bot/).
pub fn data_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(DATA_DIR))
}

/// Default location of the buffer snapshot.
pub fn default_buffer_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("buffer.json"))
}
