//! Chat relay route.
//!
//! DESIGN
//! ======
//! `POST /api/chat` forwards one user turn to the provider, chaining it to
//! `lastId` when present, and answers `{message, id}`. Every call stands
//! alone; the caller owns the response-id bookkeeping.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::llm::types::{LlmError, TurnRequest};
use crate::state::AppState;

/// Body shown to the caller for any provider failure.
pub const RELAY_FAILURE_MESSAGE: &str = "Failed to get AI response";

/// Relay wire request, shared with the client transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub input: String,
    #[serde(rename = "lastId", default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message.to_string() })).into_response()
}

/// Resolve the model for a request, substituting the default for absent or blank names.
pub(crate) fn resolve_model(requested: Option<&str>, default_model: &str) -> String {
    requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(default_model)
        .to_string()
}

/// `POST /api/chat`: relay one turn to the provider.
pub async fn relay(State(state): State<AppState>, Json(body): Json<RelayRequest>) -> Response {
    if body.input.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "input must not be empty");
    }

    let model = resolve_model(body.model.as_deref(), &state.default_model);
    let previous_response_id = body.last_id.filter(|id| !id.is_empty());
    info!(
        input_len = body.input.len(),
        %model,
        chained = previous_response_id.is_some(),
        "relay: request received"
    );

    let request = TurnRequest { input: body.input, model, previous_response_id };
    match state.llm.respond(&request).await {
        Ok(reply) => {
            info!(
                id = %reply.id,
                provider_model = %reply.model,
                input_tokens = reply.input_tokens,
                output_tokens = reply.output_tokens,
                "relay: provider replied"
            );
            Json(RelayResponse { message: reply.text, id: reply.id }).into_response()
        }
        Err(e) => {
            log_provider_error(&e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, RELAY_FAILURE_MESSAGE)
        }
    }
}

fn log_provider_error(err: &LlmError) {
    match err {
        LlmError::ApiResponse { status, body } => {
            error!(code = err.error_code(), status, body = %body, "relay: provider rejected request");
        }
        _ => error!(code = err.error_code(), error = %err, "relay: provider call failed"),
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
