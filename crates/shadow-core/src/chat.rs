//! Chat sessions.
//!
//! An [`LlmChat`] is keyed by a session id and a system prompt, holds the
//! selected provider/model pair, and submits user turns through a
//! [`ProviderFactory`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::provider::types::ChatMessage;
use crate::provider::ProviderFactory;
use crate::request::{DEFAULT_MODEL, DEFAULT_PROVIDER};

/// A free-text user turn.
#[derive(Debug, Clone)]
pub struct UserMessage {
    pub text: String,
}

impl UserMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A conversation with one LLM provider.
pub struct LlmChat {
    factory: Arc<dyn ProviderFactory>,
    api_key: String,
    session_id: String,
    provider: String,
    model: String,
    history: Vec<ChatMessage>,
}

impl LlmChat {
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        api_key: &str,
        session_id: &str,
        system_message: &str,
    ) -> Self {
        Self {
            factory,
            api_key: api_key.to_string(),
            session_id: session_id.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            history: vec![ChatMessage::system(system_message)],
        }
    }

    /// Select the provider/model pair used for subsequent messages.
    pub fn with_model(mut self, provider: &str, model: &str) -> Self {
        self.provider = provider.to_string();
        self.model = model.to_string();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Submit one user turn and return the assistant's reply.
    ///
    /// History is only extended when the provider answers.
    pub async fn send_message(&mut self, message: UserMessage) -> Result<String, ChatError> {
        let provider = self.factory.connect(&self.provider, &self.api_key)?;

        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(&message.text));

        info!(
            session = %self.session_id,
            provider = provider.name(),
            model = %self.model,
            "Sending message"
        );

        let response = provider.chat(&messages, &self.model).await?;

        debug!(
            session = %self.session_id,
            finish_reason = %response.finish_reason,
            tokens = response.usage.total_tokens,
            "Message answered"
        );

        messages.push(ChatMessage::assistant(&response.content));
        self.history = messages;
        Ok(response.content)
    }
}
