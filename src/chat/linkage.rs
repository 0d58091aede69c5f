//! Response-linkage tracker: conversation name → last provider response id.
//!
//! Entries are process-local and overwritten on every successful AI turn.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
pub struct ResponseLinkage {
    ids: Mutex<HashMap<String, String>>,
}

impl ResponseLinkage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, conversation: &str) -> Option<String> {
        self.lock().get(conversation).cloned()
    }

    pub fn set(&self, conversation: &str, response_id: &str) {
        self.lock()
            .insert(conversation.to_string(), response_id.to_string());
    }

    pub fn clear(&self, conversation: &str) {
        self.lock().remove(conversation);
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
