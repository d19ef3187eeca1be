/// LLM Client: the single point of entry for all gateway calls in Vaidya.
///
/// ARCHITECTURAL RULE: No other module may call the chat-completion gateway directly.
/// All LLM interactions MUST go through `CompletionGateway`.
///
/// This client never retries. A 429 or 402 is surfaced to the caller as-is.
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

pub mod frames;
pub mod prompts;

/// The model used for all gateway calls. Also recorded as the audit `model_version`.
pub const MODEL: &str = "google/gemini-2.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rate limit exceeded")]
    RateLimited,

    #[error("Gateway credits exhausted")]
    QuotaExhausted,

    #[error("Gateway error (status {status}): {body}")]
    Gateway { status: u16, body: String },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Gateway answered in {0} mode")]
    UnexpectedMode(&'static str),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Raw response body chunks of a streamed completion.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, LlmError>> + Send>>;

/// One message of the conversation sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub role: String,
    pub content: String,
}

impl GatewayMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionOptions {
    pub stream: bool,
    pub response_format: Option<ResponseFormat>,
}

impl CompletionOptions {
    pub fn streaming() -> Self {
        Self {
            stream: true,
            response_format: None,
        }
    }

    pub fn json_object() -> Self {
        Self {
            stream: false,
            response_format: Some(ResponseFormat::JsonObject),
        }
    }
}

/// What the gateway handed back: a byte stream or a finished completion.
pub enum Completion {
    Stream(ByteStream),
    Message(LlmResponse),
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<AssistantContent>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantContent {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// The gateway seam used by both relays. `LlmClient` is the production backend.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(
        &self,
        messages: &[GatewayMessage],
        options: CompletionOptions,
    ) -> Result<Completion, LlmError>;

    /// Streaming completion; yields raw body chunks.
    async fn stream(&self, messages: &[GatewayMessage]) -> Result<ByteStream, LlmError> {
        match self.complete(messages, CompletionOptions::streaming()).await? {
            Completion::Stream(stream) => Ok(stream),
            Completion::Message(_) => Err(LlmError::UnexpectedMode("non-streaming")),
        }
    }

    /// One-shot structured completion; returns the JSON text content.
    async fn complete_json(&self, messages: &[GatewayMessage]) -> Result<String, LlmError> {
        match self.complete(messages, CompletionOptions::json_object()).await? {
            Completion::Message(response) => {
                let text = response.text().ok_or(LlmError::EmptyContent)?;
                Ok(strip_json_fences(text).to_string())
            }
            Completion::Stream(_) => Err(LlmError::UnexpectedMode("streaming")),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [GatewayMessage],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Wraps an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LlmClient {
    pub fn new(api_key: String, endpoint: String) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Configuration(
                "gateway API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }
}

#[async_trait]
impl CompletionGateway for LlmClient {
    async fn complete(
        &self,
        messages: &[GatewayMessage],
        options: CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let body = ChatCompletionRequest {
            model: MODEL,
            messages,
            stream: options.stream,
            response_format: options.response_format.map(|f| match f {
                ResponseFormat::JsonObject => ResponseFormatBody {
                    format_type: "json_object",
                },
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("AI gateway returned {}: {}", status, body);
            return Err(classify_failure(status, body));
        }

        if options.stream {
            debug!("Streaming completion from gateway ({} messages)", messages.len());
            let stream = response.bytes_stream().map_err(LlmError::Http);
            return Ok(Completion::Stream(Box::pin(stream)));
        }

        let llm_response: LlmResponse = response.json().await?;
        if let Some(usage) = &llm_response.usage {
            debug!(
                "Gateway call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(Completion::Message(llm_response))
    }
}

/// Maps a non-success gateway status to the matching error.
pub fn classify_failure(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => LlmError::QuotaExhausted,
        other => LlmError::Gateway {
            status: other.as_u16(),
            body,
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_classify_failure_distinguishes_rate_limit_and_quota() {
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, String::new()),
            LlmError::RateLimited
        ));
        assert!(matches!(
            classify_failure(StatusCode::PAYMENT_REQUIRED, String::new()),
            LlmError::QuotaExhausted
        ));
        match classify_failure(StatusCode::BAD_GATEWAY, "oops".to_string()) {
            LlmError::Gateway { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_api_key_is_a_configuration_error() {
        let result = LlmClient::new("  ".to_string(), "http://localhost".to_string());
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_request_body_flags() {
        let messages = vec![GatewayMessage::user("hi")];
        let streamed = serde_json::to_value(ChatCompletionRequest {
            model: MODEL,
            messages: &messages,
            stream: true,
            response_format: None,
        })
        .unwrap();
        assert_eq!(streamed["stream"], true);
        assert!(streamed.get("response_format").is_none());

        let structured = serde_json::to_value(ChatCompletionRequest {
            model: MODEL,
            messages: &messages,
            stream: false,
            response_format: Some(ResponseFormatBody {
                format_type: "json_object",
            }),
        })
        .unwrap();
        assert!(structured.get("stream").is_none());
        assert_eq!(structured["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_response_text_reads_first_choice() {
        let response: LlmResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"a\":1}"}}],"usage":{"prompt_tokens":3,"completion_tokens":4}}"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("{\"a\":1}"));

        let empty: LlmResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.text(), None);
    }
}
