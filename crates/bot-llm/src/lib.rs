//! # BoT LLM
//!
//! LLM clients for the Buffer-of-Thoughts decision loop.
//!
//! Every backend implements one capability, [`LlmBackend::query`]: a system
//! prompt and a user prompt in, the completion text plus token and latency
//! accounting out. The [`MockBackend`] answers with a deterministic rule set
//! and never touches the network.
//!
//! ## Features
//!
//! - `api`: Cloud API backends (Claude, OpenAI)
//! - `local`: Local backends (Ollama)
//! - `full`: All backends
//!
//! ## Usage
//!
//! ```rust
//! use bot_llm::{LlmBackend, MockBackend};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let backend = MockBackend::new();
//! let prompt = "Situation:\n- goal_ahead: 2\n- goal_right: 0\n- front: clear\n";
//! let response = rt.block_on(backend.query("", prompt)).unwrap();
//! assert_eq!(response.text, "forward");
//! ```

mod backend;
mod factory;
mod mock;
mod prompt;

pub use backend::{LlmBackend, LlmConfig, LlmError, LlmResponse, LlmResult};
pub use factory::{build_backend, BackendKind};
pub use mock::MockBackend;
pub use prompt::{situation_int, situation_value, PromptTemplate, SITUATION_HEADER};

#[cfg(any(feature = "api", feature = "local"))]
mod http;

#[cfg(feature = "local")]
mod ollama;
#[cfg(feature = "local")]
pub use ollama::OllamaBackend;

#[cfg(feature = "api")]
mod claude;
#[cfg(feature = "api")]
pub use claude::ClaudeBackend;

#[cfg(feature = "api")]
mod openai;
#[cfg(feature = "api")]
pub use openai::OpenAiBackend;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{build_backend, BackendKind};
    pub use crate::{LlmBackend, LlmConfig, LlmError, LlmResponse, LlmResult};
    pub use crate::{MockBackend, PromptTemplate};

    #[cfg(feature = "local")]
    pub use crate::OllamaBackend;

    #[cfg(feature = "api")]
    pub use crate::{ClaudeBackend, OpenAiBackend};
}
