//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! relay keeps nothing between calls: the state is only the provider client
//! and the model used when a request omits one.

use std::sync::Arc;

use crate::llm::LlmRespond;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LlmRespond>,
    /// Model name substituted when a request has no `model`.
    pub default_model: String,
}

impl AppState {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmRespond>, default_model: impl Into<String>) -> Self {
        Self { llm, default_model: default_model.into() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
