//! LLM types: provider-neutral request/reply types and errors.
//!
//! The relay only ever sends a single user turn and lets the provider hold
//! the conversation, so the shapes here are flat: input text,
//! model, and the prior response id that chains the turn.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The API key is still the unedited placeholder value.
    #[error("API key in env var {var} is a placeholder; set a real credential")]
    PlaceholderApiKey { var: String },

    /// The HTTP request to the LLM provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The LLM provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The LLM provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl LlmError {
    /// Grepable error code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::PlaceholderApiKey { .. } => "E_PLACEHOLDER_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }
}

// =============================================================================
// REQUEST / REPLY
// =============================================================================

/// One chained turn sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// User text for this turn.
    pub input: String,
    /// Provider model name.
    pub model: String,
    /// Response id of the previous turn in the same conversation, if any.
    pub previous_response_id: Option<String>,
}

/// Provider reply for a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReply {
    /// Provider-issued id of this response; chains the next turn.
    pub id: String,
    /// Generated assistant text.
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// =============================================================================
// LLM RESPOND TRAIT
// =============================================================================

/// Provider-neutral async trait for a stateful response API. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LlmRespond: Send + Sync {
    /// Send one turn to the provider.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails or the response is malformed.
    async fn respond(&self, request: &TurnRequest) -> Result<TurnReply, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
