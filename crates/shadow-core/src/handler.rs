//! Request handler: one JSON argument in, one JSON line and an exit code out.
//!
//! Every failure becomes a [`ChatResult::Failure`]; the handler never retries
//! and makes at most one collaborator call per invocation.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::{LlmChat, UserMessage};
use crate::config::Environment;
use crate::error::ChatError;
use crate::provider::ProviderFactory;
use crate::request::{ChatRequest, ValidationError};

/// Body written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatResult {
    Success {
        success: bool,
        response: String,
        timestamp: String,
    },
    Failure {
        error: String,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl ChatResult {
    pub fn success(response: String) -> Self {
        Self::Success {
            success: true,
            response,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Failure without a category label.
    pub fn message(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            kind: None,
            details: None,
        }
    }

    /// The argument could not be read as a request.
    pub fn invalid_input(details: impl Into<String>) -> Self {
        Self::Failure {
            error: "Invalid input".into(),
            kind: None,
            details: Some(details.into()),
        }
    }

    /// Failure labelled with a category name.
    pub fn categorized(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            kind: Some(kind.into()),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Serialize as a single newline-terminated JSON line.
    pub fn to_json_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"error":"Failed to serialize result: {e}"}}"#)
        });
        line.push('\n');
        line
    }
}

impl From<ValidationError> for ChatResult {
    fn from(err: ValidationError) -> Self {
        Self::message(err.to_string())
    }
}

impl From<ChatError> for ChatResult {
    fn from(err: ChatError) -> Self {
        Self::categorized(err.to_string(), err.kind())
    }
}

/// Runs the validate-delegate-format pipeline for one request.
pub struct RequestHandler {
    env: Arc<dyn Environment>,
    factory: Arc<dyn ProviderFactory>,
}

impl RequestHandler {
    pub fn new(env: Arc<dyn Environment>, factory: Arc<dyn ProviderFactory>) -> Self {
        Self { env, factory }
    }

    /// Handle the first positional argument, if any.
    pub async fn handle(&self, input: Option<&str>) -> ChatResult {
        let Some(input) = input else {
            return ChatResult::message("No input provided");
        };

        let request = match ChatRequest::parse(input) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Rejected unparseable input");
                return ChatResult::invalid_input(e.to_string());
            }
        };

        let request = match request.resolve(self.env.as_ref()) {
            Ok(r) => r,
            Err(e) => return e.into(),
        };

        info!(
            session = %request.session_id,
            provider = %request.provider,
            model = %request.model,
            "Handling chat request"
        );

        let mut chat = LlmChat::new(
            self.factory.clone(),
            &request.api_key,
            &request.session_id,
            &request.system_message,
        )
        .with_model(&request.provider, &request.model);

        match chat.send_message(UserMessage::new(request.message)).await {
            Ok(response) => ChatResult::success(response),
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Chat request failed");
                e.into()
            }
        }
    }
}
