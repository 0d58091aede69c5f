//! LLM: provider adapter behind the relay endpoint.
//!
//! DESIGN
//! ======
//! Uses environment variables instead of config files. `LlmClient` wraps the
//! `OpenAI` Responses client, the only provider that chains turns by a
//! server-issued response id.

pub mod config;
pub mod openai;
pub mod types;

use config::LlmConfig;
pub use types::LlmRespond;
use types::{LlmError, TurnReply, TurnRequest};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete LLM client configured by [`LlmClient::from_env`].
pub struct LlmClient {
    inner: openai::OpenAiClient,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or a placeholder, or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = openai::OpenAiClient::new(config.api_key, config.openai_base_url, config.timeouts)?;
        Ok(Self { inner, model: config.model })
    }

    /// Return the configured default model name (e.g. `"gpt-4o-mini"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmRespond for LlmClient {
    async fn respond(&self, request: &TurnRequest) -> Result<TurnReply, LlmError> {
        self.inner.respond(request).await
    }
}
