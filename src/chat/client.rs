//! AI response client: one relay round trip per AI turn.
//!
//! DESIGN
//! ======
//! Reads the conversation's last response id, sends `{input, lastId, model}`
//! to the relay, and records the new id only after a successful reply. A
//! failed call leaves the linkage untouched. No retries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::linkage::ResponseLinkage;
use crate::routes::chat::{RelayRequest, RelayResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The relay could not be reached or answered with a non-success status.
    #[error("relay request failed{}: {reason}", status_suffix(.status))]
    RelayFailure { status: Option<u16>, reason: String },

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl ClientError {
    fn transport(reason: impl ToString) -> Self {
        Self::RelayFailure { status: None, reason: reason.to_string() }
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Carries one relay request. Enables mocking in tests.
#[async_trait::async_trait]
pub trait RelayTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ClientError::RelayFailure`] on network errors, non-2xx
    /// statuses, or an undecodable body.
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, ClientError>;
}

pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RELAY_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Client-side limits for one relay round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for RelayTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_RELAY_TIMEOUT_SECS, connect_secs: DEFAULT_RELAY_CONNECT_TIMEOUT_SECS }
    }
}

/// HTTP transport posting JSON to the relay's `/api/chat`.
pub struct HttpRelay {
    http: reqwest::Client,
    url: String,
}

impl HttpRelay {
    /// `base_url` is the relay origin, e.g. `http://127.0.0.1:3000`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeouts: RelayTimeouts) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        let url = format!("{}/api/chat", base_url.trim_end_matches('/'));
        Ok(Self { http, url })
    }
}

#[async_trait::async_trait]
impl RelayTransport for HttpRelay {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(ClientError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RelayFailure { status: Some(status.as_u16()), reason: body });
        }
        response
            .json::<RelayResponse>()
            .await
            .map_err(ClientError::transport)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct AiResponseClient {
    transport: Arc<dyn RelayTransport>,
    linkage: Arc<ResponseLinkage>,
}

impl AiResponseClient {
    #[must_use]
    pub fn new(transport: Arc<dyn RelayTransport>, linkage: Arc<ResponseLinkage>) -> Self {
        Self { transport, linkage }
    }

    #[must_use]
    pub fn linkage(&self) -> &ResponseLinkage {
        &self.linkage
    }

    /// Request the AI reply to `text` in `conversation`, chaining to its last response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RelayFailure`] if the relay call fails; the
    /// linkage is not modified in that case.
    pub async fn request_reply(
        &self,
        text: &str,
        conversation: &str,
        model: Option<&str>,
    ) -> Result<String, ClientError> {
        let request = RelayRequest {
            input: text.to_string(),
            last_id: self.linkage.get(conversation),
            model: model.map(str::to_string),
        };
        debug!(conversation, chained = request.last_id.is_some(), "client: relay request");

        let reply = self.transport.send(&request).await.inspect_err(|e| {
            warn!(conversation, error = %e, "client: relay failed");
        })?;

        self.linkage.set(conversation, &reply.id);
        Ok(reply.message)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
pub(crate) mod tests;
