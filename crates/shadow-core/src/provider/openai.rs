//! OpenAI-compatible LLM provider.
//!
//! This single implementation covers every provider that exposes an
//! OpenAI-compatible chat completions endpoint:
//!
//! - OpenAI (`https://api.openai.com/v1`)
//! - OpenRouter (`https://openrouter.ai/api/v1`)
//! - Anthropic (`https://api.anthropic.com/v1`)
//! - DeepSeek (`https://api.deepseek.com/v1`)
//! - Groq (`https://api.groq.com/openai/v1`)
//! - Gemini (`https://generativelanguage.googleapis.com/v1beta/openai`)
//! - vLLM / any local server, through a configured `apiBase`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{ChatMessage, LlmResponse, Usage};
use super::LlmProvider;
use crate::config::RequestSettings;
use crate::error::ChatError;

/// Known provider base URLs.
const PROVIDER_URLS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("anthropic", "https://api.anthropic.com/v1"),
    ("deepseek", "https://api.deepseek.com/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    (
        "gemini",
        "https://generativelanguage.googleapis.com/v1beta/openai",
    ),
];

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 500;
/// Backoff stops doubling after this many retries (32 s).
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Delay before retry number `retry` (1-based).
fn backoff_delay(retry: u32) -> std::time::Duration {
    let exponent = retry.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    std::time::Duration::from_millis(BASE_DELAY_MS.saturating_mul(1u64 << exponent))
}

/// Look up the built-in base URL for a provider name.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    PROVIDER_URLS
        .iter()
        .find(|(name, _)| *name == provider_name)
        .map(|(_, url)| *url)
}

/// Provider speaking the `/chat/completions` protocol.
///
/// Transient failures (network errors, 429, 500, 502, 503, 504) are retried
/// with exponential backoff, up to `max_retries` attempts in total.
pub struct OpenAiProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    settings: RequestSettings,
}

impl OpenAiProvider {
    /// Create a new provider.
    ///
    /// # Arguments
    /// * `provider_name` - Provider identifier (e.g., "openrouter", "openai", "vllm")
    /// * `api_key` - API key for authentication
    /// * `base_url` - Endpoint root, without the `/chat/completions` suffix
    /// * `settings` - Token limit, temperature and retry budget
    pub fn new(
        provider_name: &str,
        api_key: &str,
        base_url: &str,
        settings: RequestSettings,
        client: Client,
    ) -> Self {
        Self {
            client,
            name: provider_name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        }
    }

    async fn send_once(&self, url: &str, body: &CompletionRequest<'_>) -> Result<LlmResponse, ChatError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.message())
                .unwrap_or(text);
            return Err(ChatError::from_status(status.as_u16(), message));
        }

        let completion: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ChatError::MalformedResponse(format!("Failed to parse completion: {e}")))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::MalformedResponse("response contained no choices".into()))?;

        let content = choice
            .message
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ChatError::MalformedResponse("response contained no message content".into()))?;

        let usage = completion.usage.map_or(Usage::default(), |u| Usage {
            prompt_tokens: u.prompt_tokens.unwrap_or(0),
            completion_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens.unwrap_or(0),
        });

        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            tokens = usage.total_tokens,
            "Received LLM response"
        );

        Ok(LlmResponse {
            content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".into()),
            usage,
        })
    }
}

// ── OpenAI API request/response types ───────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageResponse {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Single(ErrorBody),
    Multiple(Vec<ErrorBody>),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ErrorResponse {
    fn message(&self) -> String {
        match self {
            Self::Single(b) => b.error.message.clone(),
            Self::Multiple(v) => v
                .first()
                .map(|b| b.error.message.clone())
                .unwrap_or_else(|| "Unknown error".into()),
        }
    }
}

// ── LlmProvider implementation ──────────────────────────────────────

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<LlmResponse, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model,
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        debug!(provider = %self.name, model, url = %url, msg_count = messages.len(), "Sending chat completion request");

        let attempts = self.settings.max_retries.max(1);
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            attempt += 1;

            match self.send_once(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %e, "Transient LLM API error, will retry");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn provider(base_url: &str, max_retries: u32) -> OpenAiProvider {
        let settings = RequestSettings {
            max_retries,
            ..RequestSettings::default()
        };
        OpenAiProvider::new("openai", "test-key", base_url, settings, Client::new())
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })
    }

    #[test]
    fn test_provider_url_lookup() {
        assert_eq!(default_base_url("openrouter"), Some("https://openrouter.ai/api/v1"));
        assert_eq!(default_base_url("deepseek"), Some("https://api.deepseek.com/v1"));
        assert_eq!(default_base_url("vllm"), None);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let p = provider("http://localhost:8000/v1/", 1);
        assert_eq!(p.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1).as_millis(), 500);
        assert_eq!(backoff_delay(2).as_millis(), 1000);
        assert_eq!(backoff_delay(4).as_millis(), 4000);
        assert_eq!(backoff_delay(7).as_millis(), 32_000);
        assert_eq!(backoff_delay(60), backoff_delay(7));
        assert_eq!(backoff_delay(u32::MAX), backoff_delay(7));
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("Authorization", "Bearer test-key");
                then.status(200).json_body(completion("hello"));
            })
            .await;

        let p = provider(&server.url("/v1"), 1);
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let response = p.chat(&messages, "gpt-4o-mini").await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "hello");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401)
                    .json_body(json!({"error": {"message": "Incorrect API key provided"}}));
            })
            .await;

        let p = provider(&server.url("/v1"), 3);
        let err = p.chat(&[ChatMessage::user("hi")], "gpt-4o-mini").await.unwrap_err();

        mock.assert_hits_async(1).await;
        assert_eq!(err.kind(), "AuthenticationError");
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(503).body("upstream overloaded");
            })
            .await;

        let p = provider(&server.url("/v1"), 2);
        let err = p.chat(&[ChatMessage::user("hi")], "gpt-4o-mini").await.unwrap_err();

        mock.assert_hits_async(2).await;
        assert_eq!(err.kind(), "ProviderError");
        assert_eq!(err.to_string(), "provider error (503): upstream overloaded");
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let p = provider(&server.url("/v1"), 1);
        let err = p.chat(&[ChatMessage::user("hi")], "gpt-4o-mini").await.unwrap_err();
        assert_eq!(err.kind(), "MalformedResponseError");
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).body("<html>gateway</html>");
            })
            .await;

        let p = provider(&server.url("/v1"), 1);
        let err = p.chat(&[ChatMessage::user("hi")], "gpt-4o-mini").await.unwrap_err();
        assert_eq!(err.kind(), "MalformedResponseError");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop a listener so the port is closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let p = provider(&format!("http://127.0.0.1:{port}/v1"), 1);
        let err = p.chat(&[ChatMessage::user("hi")], "gpt-4o-mini").await.unwrap_err();
        assert_eq!(err.kind(), "NetworkError");
    }
}
