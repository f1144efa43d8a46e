//! Google Gemini through the Generative Language REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    for_each_line, send_with_retry, sse_data, ChatMessage, CompletionOptions, LlmBackend,
    LlmError, Role,
};

const DEFAULT_TEMPERATURE: f64 = 0.2;
const TOP_P: f64 = 0.95;
const TOP_K: u32 = 40;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Result<String, LlmError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(LlmError::Blocked(reason));
        }

        let Some(candidate) = self.candidates.first() else {
            return Ok(String::new());
        };
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(LlmError::Blocked("SAFETY".to_string()));
        }

        Ok(candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

impl GeminiBackend {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Config(
                "Gemini API key not found. Get one at https://ai.google.dev/ and set GEMINI_API_KEY"
                    .to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
        })
    }

    fn url(&self, stream: bool) -> String {
        if stream {
            format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            )
        } else {
            format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
        }
    }

    fn request_body<'a>(
        &self,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
    ) -> GenerateRequest<'a> {
        let system_parts: Vec<Part<'a>> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part { text: &m.content })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: if m.role == Role::Assistant { "model" } else { "user" },
                parts: vec![Part { text: &m.content }],
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction: (!system_parts.is_empty())
                .then_some(SystemInstruction { parts: system_parts }),
            safety_settings: HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: options.max_tokens,
                response_mime_type: options.json_output.then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn provider(&self) -> &'static str {
        "gemini"
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
        let url = self.url(options.stream);

        let response = send_with_retry("gemini", || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        let text = if options.stream {
            let mut text = String::new();
            for_each_line(response, |line| read_stream_line(line, &mut text)).await?;
            text
        } else {
            let response: GenerateResponse = response.json().await?;
            response.text()?
        };

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

/// Handles one SSE line of `streamGenerateContent`. Gemini ends the stream by
/// closing it, so every line keeps reading.
fn read_stream_line(line: &str, text: &mut String) -> Result<bool, LlmError> {
    if let Some(data) = sse_data(line) {
        let chunk: GenerateResponse = serde_json::from_str(data)?;
        let token = chunk.text()?;
        debug!(target: "applier::stream", "{}", token);
        text.push_str(&token);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> GeminiBackend {
        GeminiBackend::new(
            Client::new(),
            "https://generativelanguage.googleapis.com/",
            "key",
            "gemini-2.0-flash",
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let b = backend();
        assert_eq!(
            b.url(false),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(b.url(true).ends_with(":streamGenerateContent?alt=sse"));
    }

    #[test]
    fn test_request_body_maps_roles_and_safety() {
        let messages = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("Question?"),
            ChatMessage {
                role: Role::Assistant,
                content: "Earlier reply".to_string(),
            },
        ];
        let body =
            serde_json::to_value(backend().request_body(&messages, &CompletionOptions::default()))
                .unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["temperature"].as_f64(), Some(0.2));
        assert_eq!(body["generationConfig"]["topP"].as_f64(), Some(0.95));
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_json_mode_sets_mime_type() {
        let messages = vec![ChatMessage::user("extract")];
        let options = CompletionOptions {
            json_output: true,
            ..Default::default()
        };
        let body = serde_json::to_value(backend().request_body(&messages, &options)).unwrap();
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().unwrap(), "Hello, world");
    }

    #[test]
    fn test_blocked_prompt_is_error() {
        let json = r#"{"promptFeedback": {"blockReason": "OTHER"}}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(response.text(), Err(LlmError::Blocked(r)) if r == "OTHER"));
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = GeminiBackend::new(Client::new(), "https://x", "", "gemini-2.0-flash");
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn test_stream_transcript() {
        let transcript = r#": keep-alive
data: {"candidates": [{"content": {"parts": [{"text": "Hello"}], "role": "model"}}]}

data: {"candidates": [{"content": {"parts": [{"text": ", world"}], "role": "model"}, "finishReason": "STOP"}]}"#;

        let mut text = String::new();
        for line in transcript.lines().filter(|l| !l.trim().is_empty()) {
            assert!(read_stream_line(line, &mut text).unwrap());
        }
        assert_eq!(text, "Hello, world");
    }

    #[test]
    fn test_stream_safety_stop_is_error() {
        let mut text = String::new();
        let line = r#"data: {"candidates": [{"finishReason": "SAFETY"}]}"#;
        assert!(matches!(
            read_stream_line(line, &mut text),
            Err(LlmError::Blocked(_))
        ));
    }
}
