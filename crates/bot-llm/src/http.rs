//! Shared HTTP plumbing for the network backends.

use crate::backend::{LlmConfig, LlmError, LlmResult};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Used when a provider rate-limits without a `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u32 = 30;

/// Who a request goes to, for error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'a> {
    pub provider: &'static str,
    pub url: &'a str,
    pub model: &'a str,
    pub timeout_secs: u32,
}

impl<'a> Target<'a> {
    pub fn new(provider: &'static str, url: &'a str, config: &'a LlmConfig) -> Self {
        Self {
            provider,
            url,
            model: &config.model,
            timeout_secs: config.timeout_secs,
        }
    }
}

/// A non-success HTTP reply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Failure {
    pub status: u16,
    pub retry_after: Option<u32>,
    pub body: String,
}

pub(crate) fn client(config: &LlmConfig) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
        .build()
        .map_err(|e| LlmError::ConnectionFailed(format!("Failed to create HTTP client: {e}")))
}

/// Send a prepared request and decode a JSON reply.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    target: Target<'_>,
) -> LlmResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(&e, target))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = response.text().await.unwrap_or_default();
        return Err(classify(
            &Failure {
                status: status.as_u16(),
                retry_after,
                body,
            },
            target,
        ));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(format!("{}: {e}", target.provider)))
}

fn transport_error(e: &reqwest::Error, target: Target<'_>) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(target.timeout_secs)
    } else if e.is_connect() {
        LlmError::ConnectionFailed(format!("Cannot reach {} at {}", target.provider, target.url))
    } else {
        LlmError::ApiError(e.to_string())
    }
}

/// Map an HTTP failure onto [`LlmError`].
///
/// Overload and gateway errors are reported as connection failures so the
/// runner retries them.
pub(crate) fn classify(failure: &Failure, target: Target<'_>) -> LlmError {
    match failure.status {
        401 | 403 => LlmError::AuthenticationFailed,
        404 => LlmError::ModelNotFound(target.model.to_string()),
        429 => LlmError::RateLimited(failure.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
        400 | 413 if mentions_context_limit(&failure.body) => {
            LlmError::ContextTooLong(format!("{}: {}", target.provider, failure.body.trim()))
        }
        502 | 503 | 504 | 529 => LlmError::ConnectionFailed(format!(
            "{} unavailable ({})",
            target.provider, failure.status
        )),
        status => LlmError::ApiError(format!("{} error {}: {}", target.provider, status, failure.body)),
    }
}

const CONTEXT_LIMIT_HINTS: [&str; 4] = [
    "context length",
    "context window",
    "too many tokens",
    "prompt is too long",
];

fn mentions_context_limit(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    CONTEXT_LIMIT_HINTS.iter().any(|hint| body.contains(hint))
}
