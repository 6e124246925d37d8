//! Typed failures raised by the chat client.
//!
//! The provider adapter picks the variant; the request handler only forwards
//! [`ChatError::kind`] as the `type` label of the failure body.

use thiserror::Error;

/// Failure surfaced while constructing a chat session or submitting a message.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The provider rejected the credentials (HTTP 401/403).
    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    /// The request never produced an HTTP response (DNS, connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The provider answered 2xx but the body was not a usable completion.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// No endpoint is known for the requested provider name.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// The chat client's own settings could not be loaded.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Unknown(String),
}

impl ChatError {
    /// Category label reported alongside the error message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AuthenticationError",
            Self::Network(_) => "NetworkError",
            Self::Provider { .. } => "ProviderError",
            Self::MalformedResponse(_) => "MalformedResponseError",
            Self::UnsupportedProvider(_) => "UnsupportedProviderError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Unknown(_) => "UnknownError",
        }
    }

    /// Whether the provider adapter may try the same request again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Provider { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Map a non-success HTTP status and the provider's message to a variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Authentication { status, message },
            _ => Self::Provider { status, message },
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::MalformedResponse(err.to_string());
        }
        Self::Network(err.to_string())
    }
}
