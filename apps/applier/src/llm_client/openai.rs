//! OpenAI-compatible chat completions: OpenAI, DeepSeek, and local servers that
//! mimic the API (LM Studio, llama.cpp, Jan).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    for_each_line, send_with_retry, sse_data, ChatMessage, CompletionOptions, LlmBackend,
    LlmError,
};
use crate::config::{LlmSpec, Provider};

pub struct OpenAiBackend {
    client: Client,
    provider: Provider,
    spec: LlmSpec,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(
        client: Client,
        provider: Provider,
        spec: LlmSpec,
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Self, LlmError> {
        // The provider's own hosted API always needs a key; local servers may not.
        let hosted = base_url.trim().trim_end_matches('/')
            == provider.default_api_url().trim_end_matches('/');
        if (spec == LlmSpec::OpenAi || hosted) && api_key.trim().is_empty() {
            return Err(LlmError::Config(format!(
                "LLM_API_KEY is required for provider '{}'",
                provider.as_str()
            )));
        }

        Ok(Self {
            client,
            provider,
            spec,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
        })
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
    ) -> ChatRequest<'a> {
        // Not every OpenAI-like server understands response_format.
        let response_format = (options.json_output && self.spec == LlmSpec::OpenAi)
            .then_some(ResponseFormat {
                format_type: "json_object",
            });

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
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn provider(&self) -> &'static str {
        self.provider.as_str()
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

        let response = send_with_retry(self.provider.as_str(), || {
            let request = self.client.post(&self.endpoint).json(&body);
            if self.api_key.is_empty() {
                request
            } else {
                request.bearer_auth(&self.api_key)
            }
        })
        .await?;

        let text = if options.stream {
            let mut text = String::new();
            for_each_line(response, |line| read_stream_line(line, &mut text)).await?;
            text
        } else {
            let response: ChatResponse = response.json().await?;
            if let Some(usage) = &response.usage {
                debug!(
                    "{} call succeeded: prompt_tokens={}, completion_tokens={}",
                    self.provider.as_str(),
                    usage.prompt_tokens,
                    usage.completion_tokens
                );
            }
            parse_content(response)?
        };

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

/// Handles one SSE line. Returns `Ok(false)` once the stream reports `[DONE]`.
fn read_stream_line(line: &str, text: &mut String) -> Result<bool, LlmError> {
    let Some(data) = sse_data(line) else {
        return Ok(true);
    };
    if data == "[DONE]" {
        return Ok(false);
    }
    let chunk: StreamChunk = serde_json::from_str(data)?;
    if let Some(token) = chunk.choices.first().and_then(|c| c.delta.content.as_deref()) {
        debug!(target: "applier::stream", "{}", token);
        text.push_str(token);
    }
    Ok(true)
}

fn parse_content(response: ChatResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(LlmError::EmptyContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(spec: LlmSpec) -> OpenAiBackend {
        OpenAiBackend::new(
            Client::new(),
            Provider::OpenAi,
            spec,
            "http://localhost:1234/v1/",
            "sk-test",
            "gpt-4o-mini",
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            backend(LlmSpec::OpenAi).endpoint,
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_json_mode_only_for_openai_spec() {
        let messages = vec![ChatMessage::user("hi")];
        let options = CompletionOptions {
            json_output: true,
            ..Default::default()
        };

        let strict = backend(LlmSpec::OpenAi);
        let body = serde_json::to_value(strict.request_body(&messages, &options)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");

        let like = backend(LlmSpec::OpenAiLike);
        let body = serde_json::to_value(like.request_body(&messages, &options)).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_request_body_omits_unset_options() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let b = backend(LlmSpec::OpenAi);
        let body = serde_json::to_value(b.request_body(&messages, &CompletionOptions::default()))
            .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream"], false);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_content_first_choice() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Yes"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parse_content(response).unwrap(), "Yes");
    }

    #[test]
    fn test_parse_content_no_choices() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(parse_content(response), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_stream_chunk_delta() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices": [{"delta": {"content": "Hel"}, "index": 0}]}"#)
                .unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
    }

    #[test]
    fn test_temperature_serializes_exactly() {
        let messages = vec![ChatMessage::user("hi")];
        let options = CompletionOptions {
            temperature: Some(0.1),
            ..Default::default()
        };
        let body =
            serde_json::to_value(backend(LlmSpec::OpenAi).request_body(&messages, &options))
                .unwrap();
        assert_eq!(body["temperature"].as_f64(), Some(0.1));
    }

    #[test]
    fn test_stream_transcript_stops_at_done() {
        let transcript = r#": keep-alive
data: {"choices": [{"delta": {"role": "assistant"}, "index": 0}]}
data: {"choices": [{"delta": {"content": "Hel"}, "index": 0}]}

data: {"choices": [{"delta": {"content": "lo"}, "index": 0}]}
data: [DONE]
data: {"choices": [{"delta": {"content": " ignored"}, "index": 0}]}"#;

        let mut text = String::new();
        let mut consumed = 0;
        for line in transcript.lines().filter(|l| !l.trim().is_empty()) {
            consumed += 1;
            if !read_stream_line(line, &mut text).unwrap() {
                break;
            }
        }
        assert_eq!(text, "Hello");
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_stream_line_malformed_json() {
        let mut text = String::new();
        let result = read_stream_line("data: {not json", &mut text);
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_missing_key_rejected_for_hosted_url() {
        let result = OpenAiBackend::new(
            Client::new(),
            Provider::OpenAi,
            LlmSpec::OpenAiLike,
            "https://api.openai.com/v1/",
            "",
            "gpt-4o-mini",
        );
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn test_missing_key_rejected_for_openai_spec() {
        let result = OpenAiBackend::new(
            Client::new(),
            Provider::DeepSeek,
            LlmSpec::OpenAi,
            "https://api.deepseek.com/v1",
            "  ",
            "deepseek-chat",
        );
        assert!(matches!(result, Err(LlmError::Config(_))));
    }
}
