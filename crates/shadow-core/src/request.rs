//! The chat request accepted on the command line.
//!
//! [`ChatRequest`] mirrors the JSON argument field for field; [`ChatRequest::resolve`]
//! applies the defaults and the API key fallback and runs the two validation checks.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::config::{Environment, API_KEY_ENV};

pub const DEFAULT_SESSION_ID: &str = "default";
pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are Shadow, an AI coding agent.";

/// Raw request as supplied by the caller. `null` and absent are equivalent,
/// except for `apiKey`: an explicit `null` there suppresses the environment
/// fallback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// `None` when absent, `Some(None)` when given as `null`.
    #[serde(default, deserialize_with = "present")]
    pub api_key: Option<Option<String>>,
    pub system_message: Option<String>,
}

/// A request with every field filled in and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub session_id: String,
    pub message: String,
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub system_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No message provided")]
    MissingMessage,
    #[error("No API key provided")]
    MissingApiKey,
}

impl ChatRequest {
    /// Parse the JSON argument. Anything but an object whose fields are
    /// strings or `null` is rejected.
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Apply defaults and the environment fallback, then validate.
    ///
    /// The message is checked before the API key. An explicit `apiKey` wins
    /// over the environment even when it is empty or `null`.
    pub fn resolve(self, env: &dyn Environment) -> Result<ResolvedRequest, ValidationError> {
        let message = self.message.unwrap_or_default();
        if message.is_empty() {
            return Err(ValidationError::MissingMessage);
        }

        let api_key = match self.api_key {
            Some(given) => given.unwrap_or_default(),
            None => env.var(API_KEY_ENV).unwrap_or_default(),
        };
        if api_key.is_empty() {
            return Err(ValidationError::MissingApiKey);
        }

        Ok(ResolvedRequest {
            session_id: self.session_id.unwrap_or_else(|| DEFAULT_SESSION_ID.into()),
            message,
            provider: self.provider.unwrap_or_else(|| DEFAULT_PROVIDER.into()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key,
            system_message: self
                .system_message
                .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.into()),
        })
    }
}

/// Marks a field as present, so `null` maps to `Some(None)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
