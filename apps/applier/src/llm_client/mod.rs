//! LLM Client: the single point of entry for every model call in Applier.
//!
//! No other module talks to a provider directly. The answer service holds an
//! `Arc<dyn LlmBackend>` picked once at startup by `build_backend`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AiConfig, Provider};

pub mod gemini;
pub mod json;
pub mod ollama;
pub mod openai;
pub mod prompts;

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call knobs. `None` leaves the backend's own default in place.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object when it supports a JSON mode.
    pub json_output: bool,
    pub stream: bool,
}

/// A chat-completion provider. Implementations must return the full text of the
/// reply, concatenating streamed chunks when `options.stream` is set.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn provider(&self) -> &'static str;

    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;
}

/// Builds the backend selected by `AI_PROVIDER`.
pub fn build_backend(config: &AiConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let client = http_client(config.timeout_secs)?;

    let backend: Arc<dyn LlmBackend> = match config.provider {
        Provider::OpenAi | Provider::DeepSeek => Arc::new(OpenAiBackend::new(
            client,
            config.provider,
            config.llm_spec,
            &config.llm_api_url,
            &config.llm_api_key,
            &config.llm_model,
        )?),
        Provider::Ollama => Arc::new(OllamaBackend::new(
            client,
            &config.llm_api_url,
            &config.llm_model,
        )),
        Provider::Gemini => Arc::new(GeminiBackend::new(
            client,
            &config.gemini_api_url,
            &config.gemini_api_key,
            &config.gemini_model,
        )?),
    };

    info!(
        "LLM backend ready: provider={}, model={}",
        backend.provider(),
        backend.model()
    );
    Ok(backend)
}

fn http_client(timeout_secs: u64) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(LlmError::Http)
}

/// Sends a request, retrying on 429 (rate limit) and 5xx errors with exponential
/// backoff. `build` is called once per attempt since request bodies are consumed.
pub(crate) async fn send_with_retry<F>(label: &str, build: F) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                "{} call attempt {} failed, retrying after {}ms...",
                label,
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(LlmError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} API returned {}: {}", label, status, body);
            last_error = Some(LlmError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        return Ok(response);
    }

    Err(retries_exhausted(last_error))
}

/// Final error once every attempt failed. A provider still answering 429 on the
/// last attempt is reported as rate limiting rather than a plain API error.
fn retries_exhausted(last_error: Option<LlmError>) -> LlmError {
    match last_error {
        Some(LlmError::Api { status: 429, .. }) | None => LlmError::RateLimited {
            retries: MAX_RETRIES,
        },
        Some(e) => e,
    }
}

/// Pulls a human-readable message out of a provider error body.
/// Handles `{"error": {"message": ".."}}`, `{"error": ".."}` and plain text.
pub(crate) fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.trim().to_string())
}

/// Splits a byte stream into trimmed, non-blank lines. Splitting happens on raw
/// bytes so a multi-byte character cut across chunks survives.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends a chunk and returns every line it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever followed the last newline.
    pub(crate) fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

/// Feeds a streamed body to `on_line` one line at a time. Stops early when
/// `on_line` returns `Ok(false)`.
pub(crate) async fn for_each_line<F>(mut response: Response, mut on_line: F) -> Result<(), LlmError>
where
    F: FnMut(&str) -> Result<bool, LlmError>,
{
    let mut buffer = LineBuffer::default();

    while let Some(chunk) = response.chunk().await? {
        for line in buffer.push(&chunk) {
            if !on_line(&line)? {
                return Ok(());
            }
        }
    }

    if let Some(rest) = buffer.finish() {
        on_line(&rest)?;
    }
    Ok(())
}

/// Returns the payload of a server-sent-events `data:` line.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}
