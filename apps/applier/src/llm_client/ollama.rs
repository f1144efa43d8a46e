//! Local Ollama server through its native `/api/chat` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{for_each_line, send_with_retry, ChatMessage, CompletionOptions, LlmBackend, LlmError};

const DEFAULT_TEMPERATURE: f64 = 0.0;
const DEFAULT_NUM_PREDICT: u32 = 2000;

pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: ModelOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f64,
    num_predict: u32,
}

/// Shape of both the single response and each NDJSON stream line.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaBackend {
    pub fn new(client: Client, api_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(api_url),
            model: model.to_string(),
        }
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: options.stream,
            format: options.json_output.then_some("json"),
            options: ModelOptions {
                temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                num_predict: options.max_tokens.unwrap_or(DEFAULT_NUM_PREDICT),
            },
        }
    }
}

/// OpenAI-style URLs (`http://host:11434/v1`) are accepted; the native API
/// lives at the server root.
fn normalize_base_url(api_url: &str) -> String {
    let trimmed = api_url.trim().trim_end_matches('/');
    match trimmed.find("/v1") {
        Some(pos) => trimmed[..pos].to_string(),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn provider(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let body = self.request_body(messages, options);
        let url = format!("{}/api/chat", self.base_url);

        let response =
            send_with_retry("ollama", || self.client.post(&url).json(&body)).await?;

        let text = if options.stream {
            let mut text = String::new();
            for_each_line(response, |line| read_stream_line(line, &mut text)).await?;
            text
        } else {
            let response: ChatResponse = response.json().await?;
            if let Some(error) = response.error {
                return Err(LlmError::Api {
                    status: 200,
                    message: error,
                });
            }
            debug!(
                "ollama call succeeded: prompt_eval_count={:?}, eval_count={:?}",
                response.prompt_eval_count, response.eval_count
            );
            response.message.map(|m| m.content).unwrap_or_default()
        };

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

/// Handles one NDJSON line. Returns `Ok(false)` on the line marked `done`.
fn read_stream_line(line: &str, text: &mut String) -> Result<bool, LlmError> {
    let chunk: ChatResponse = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(LlmError::Api {
            status: 200,
            message: error,
        });
    }
    if let Some(message) = chunk.message {
        debug!(target: "applier::stream", "{}", message.content);
        text.push_str(&message.content);
    }
    Ok(!chunk.done)
}
