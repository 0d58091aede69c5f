use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::Request;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;
use crate::routes::app;
use crate::state::test_helpers::{MockLlm, reply, test_app_state};

async fn post_chat(llm: Arc<MockLlm>, body: Value) -> (StatusCode, Value) {
    let router = app(test_app_state(llm));
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// =============================================================================
// resolve_model
// =============================================================================

#[test]
fn resolve_model_defaults_when_absent() {
    assert_eq!(resolve_model(None, "gpt-4o-mini"), "gpt-4o-mini");
}

#[test]
fn resolve_model_defaults_when_blank() {
    assert_eq!(resolve_model(Some("  "), "gpt-4o-mini"), "gpt-4o-mini");
}

#[test]
fn resolve_model_keeps_requested() {
    assert_eq!(resolve_model(Some("gpt-4"), "gpt-4o-mini"), "gpt-4");
}

// =============================================================================
// POST /api/chat
// =============================================================================

#[tokio::test]
async fn relay_returns_message_and_id() {
    let llm = Arc::new(MockLlm::new(vec![Ok(reply("r1", "Hi"))]));
    let (status, body) = post_chat(llm.clone(), json!({ "input": "hello" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Hi", "id": "r1" }));

    let sent = llm.recorded();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].input, "hello");
    assert_eq!(sent[0].model, "gpt-4o-mini");
    assert_eq!(sent[0].previous_response_id, None);
}

#[tokio::test]
async fn relay_passes_last_id_and_model_through() {
    let llm = Arc::new(MockLlm::new(vec![Ok(reply("r2", "again"))]));
    let (status, _) = post_chat(llm.clone(), json!({ "input": "more", "lastId": "r1", "model": "gpt-4" })).await;

    assert_eq!(status, StatusCode::OK);
    let sent = llm.recorded();
    assert_eq!(sent[0].previous_response_id.as_deref(), Some("r1"));
    assert_eq!(sent[0].model, "gpt-4");
}

#[tokio::test]
async fn relay_treats_empty_last_id_as_absent() {
    let llm = Arc::new(MockLlm::new(vec![]));
    let (status, _) = post_chat(llm.clone(), json!({ "input": "x", "lastId": "" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(llm.recorded()[0].previous_response_id, None);
}

#[tokio::test]
async fn relay_provider_failure_is_500_with_error_body() {
    let llm = Arc::new(MockLlm::new(vec![Err(LlmError::ApiResponse { status: 401, body: "bad key".into() })]));
    let (status, body) = post_chat(llm, json!({ "input": "hello" })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": RELAY_FAILURE_MESSAGE }));
}

#[tokio::test]
async fn relay_rejects_blank_input_without_calling_provider() {
    let llm = Arc::new(MockLlm::new(vec![]));
    let (status, body) = post_chat(llm.clone(), json!({ "input": "   " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn relay_rejects_missing_input_field() {
    let llm = Arc::new(MockLlm::new(vec![]));
    let (status, _) = post_chat(llm.clone(), json!({ "lastId": "r1" })).await;

    assert!(status.is_client_error());
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn healthz_is_ok() {
    let router = app(test_app_state(Arc::new(MockLlm::new(vec![]))));
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
