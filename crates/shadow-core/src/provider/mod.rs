//! LLM provider trait and factory.
//!
//! Defines the `LlmProvider` trait that all backends must implement, and the
//! `ProviderFactory` that binds a provider name and API key to a backend.
//! The `openai` module provides an OpenAI-compatible implementation
//! that covers most providers (OpenAI, OpenRouter, Anthropic, DeepSeek, Groq, vLLM, etc.).

pub mod openai;
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::ChatError;
use openai::OpenAiProvider;
use types::{ChatMessage, LlmResponse};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` - Conversation history, system prompt first
    /// * `model` - Model identifier
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<LlmResponse, ChatError>;

    /// Provider identifier (e.g. "openai").
    fn name(&self) -> &str;
}

/// Builds a provider bound to a provider name and API key.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, provider: &str, api_key: &str) -> Result<Box<dyn LlmProvider>, ChatError>;
}

/// Factory for HTTP providers sharing one connection pool.
pub struct HttpProviderFactory {
    client: Client,
    config: Config,
}

impl HttpProviderFactory {
    pub fn new(config: Config) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request.timeout_seconds))
            .build()
            .map_err(|e| ChatError::Unknown(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn connect(&self, provider: &str, api_key: &str) -> Result<Box<dyn LlmProvider>, ChatError> {
        let base_url = match self.config.api_base(provider) {
            Some(custom) => custom.to_string(),
            None => openai::default_base_url(provider)
                .ok_or_else(|| ChatError::UnsupportedProvider(provider.to_string()))?
                .to_string(),
        };

        debug!(provider, base_url = %base_url, "Connecting LLM provider");

        Ok(Box::new(OpenAiProvider::new(
            provider,
            api_key,
            &base_url,
            self.config.request.clone(),
            self.client.clone(),
        )))
    }
}

/// Stands in when the settings failed to load; every connect fails with the
/// load error, so request validation still runs first.
pub struct MisconfiguredFactory {
    reason: String,
}

impl MisconfiguredFactory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ProviderFactory for MisconfiguredFactory {
    fn connect(&self, _provider: &str, _api_key: &str) -> Result<Box<dyn LlmProvider>, ChatError> {
        Err(ChatError::Configuration(self.reason.clone()))
    }
}
