//! Conversation view: orchestrates one send.
//!
//! DESIGN
//! ======
//! A send walks `Idle → UserMessageAppended → AwaitingReply → ReplyAppended
//! | FailureAppended → Idle`. Human conversations stop after the user
//! message. The user message is always stored before the relay is called
//! and the reply (or fallback) after it resolves.
//!
//! At most one reply may be outstanding per conversation; a second send
//! while one is pending is rejected before anything is appended. Locks are
//! never held across the relay await.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use super::client::AiResponseClient;
use super::store::{MessageStore, StoreError};
use super::types::{Conversation, ConversationSummary, LOCAL_USER, NewConversation};

/// Appended from the contact when the relay call fails.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't get a response right now.";

/// Conversation selected before the user picks one.
pub const INITIAL_SELECTION: &str = "alice";

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("still waiting for a reply in {0}")]
    ReplyPending(String),

    #[error("message must not be empty")]
    EmptyMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    UserMessageAppended,
    /// A "typing" indicator is shown while in this phase.
    AwaitingReply,
    ReplyAppended,
    FailureAppended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Human conversation: only the user's message was appended.
    Delivered,
    /// AI reply appended.
    Replied(String),
    /// Relay failed; [`FALLBACK_REPLY`] appended.
    FallbackShown { reason: String },
}

type PhaseListener = Box<dyn Fn(&str, SendPhase) + Send + Sync>;

pub struct ConversationView {
    store: Mutex<MessageStore>,
    client: AiResponseClient,
    pending: Mutex<HashSet<String>>,
    selected: Mutex<String>,
    on_phase: Option<PhaseListener>,
}

/// Removes the pending marker when the send finishes or is dropped mid-flight.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.name);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConversationView {
    #[must_use]
    pub fn new(store: MessageStore, client: AiResponseClient) -> Self {
        Self {
            store: Mutex::new(store),
            client,
            pending: Mutex::new(HashSet::new()),
            selected: Mutex::new(INITIAL_SELECTION.to_string()),
            on_phase: None,
        }
    }

    /// Observe phase transitions, e.g. to render a typing indicator.
    #[must_use]
    pub fn with_phase_listener(mut self, listener: impl Fn(&str, SendPhase) + Send + Sync + 'static) -> Self {
        self.on_phase = Some(Box::new(listener));
        self
    }

    /// Load persisted conversations (or the seed list).
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Store`] if storage cannot be read.
    pub fn load(&self) -> Result<(), ViewError> {
        let mut store = lock(&self.store);
        let count = store.load()?.len();
        info!(count, "view: conversations loaded");
        Ok(())
    }

    #[must_use]
    pub fn client(&self) -> &AiResponseClient {
        &self.client
    }

    #[must_use]
    pub fn selected(&self) -> String {
        lock(&self.selected).clone()
    }

    /// Make `name` the active conversation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownConversation`] if there is no such conversation.
    pub fn select(&self, name: &str) -> Result<(), ViewError> {
        if lock(&self.store).get(name).is_none() {
            return Err(StoreError::UnknownConversation(name.to_string()).into());
        }
        *lock(&self.selected) = name.to_string();
        Ok(())
    }

    #[must_use]
    pub fn conversation(&self, name: &str) -> Option<Conversation> {
        lock(&self.store).get(name).cloned()
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        lock(&self.store).summaries()
    }

    #[must_use]
    pub fn search(&self, query: &str) -> Vec<ConversationSummary> {
        lock(&self.store).search(query)
    }

    #[must_use]
    pub fn is_awaiting_reply(&self, name: &str) -> bool {
        lock(&self.pending).contains(name)
    }

    /// Create a conversation and select it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateName`] or [`StoreError::EmptyName`]
    /// with the list unchanged, or a storage error.
    pub fn create(&self, new: NewConversation) -> Result<(), ViewError> {
        let name = lock(&self.store).create(new)?.name.clone();
        *lock(&self.selected) = name;
        Ok(())
    }

    /// Send `text` to the selected conversation.
    ///
    /// # Errors
    ///
    /// See [`ConversationView::send_to`].
    pub async fn send(&self, text: &str) -> Result<SendOutcome, ViewError> {
        let name = self.selected();
        self.send_to(&name, text).await
    }

    /// Send `text` to `name`, requesting an AI reply if the conversation is AI-backed.
    ///
    /// Relay failures never surface as errors; they append [`FALLBACK_REPLY`].
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::EmptyMessage`], [`ViewError::ReplyPending`],
    /// [`StoreError::UnknownConversation`], or a storage error. Nothing is
    /// appended when the first three occur. If the reply cannot be stored the
    /// conversation's linkage is left where it was before the send.
    pub async fn send_to(&self, name: &str, text: &str) -> Result<SendOutcome, ViewError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ViewError::EmptyMessage);
        }

        let (ai_model, _guard) = {
            let mut store = lock(&self.store);
            let conversation = store
                .get(name)
                .ok_or_else(|| StoreError::UnknownConversation(name.to_string()))?;
            let ai_model = conversation
                .ai
                .then(|| conversation.ai_model.clone().unwrap_or_default());
            let guard = match ai_model {
                Some(_) => Some(self.claim_pending(name)?),
                None => None,
            };
            store.append(name, LOCAL_USER, text)?;
            (ai_model, guard)
        };
        self.emit(name, SendPhase::UserMessageAppended);

        let Some(model) = ai_model else {
            self.emit(name, SendPhase::Idle);
            return Ok(SendOutcome::Delivered);
        };

        self.emit(name, SendPhase::AwaitingReply);
        let model = (!model.is_empty()).then_some(model.as_str());
        let previous_id = self.client.linkage().get(name);
        let outcome = match self.client.request_reply(text, name, model).await {
            Ok(reply) => {
                let stored = lock(&self.store).append(name, name, &reply).map(|_| ());
                if let Err(e) = stored {
                    self.restore_linkage(name, previous_id);
                    return Err(e.into());
                }
                self.emit(name, SendPhase::ReplyAppended);
                SendOutcome::Replied(reply)
            }
            Err(e) => {
                warn!(conversation = name, error = %e, "view: showing fallback reply");
                lock(&self.store).append(name, name, FALLBACK_REPLY)?;
                self.emit(name, SendPhase::FailureAppended);
                SendOutcome::FallbackShown { reason: e.to_string() }
            }
        };
        self.emit(name, SendPhase::Idle);
        Ok(outcome)
    }

    /// Undo a linkage advance whose reply never reached the store.
    fn restore_linkage(&self, name: &str, previous_id: Option<String>) {
        let linkage = self.client.linkage();
        match previous_id {
            Some(id) => linkage.set(name, &id),
            None => linkage.clear(name),
        }
        warn!(conversation = name, "view: reply not stored, linkage rolled back");
    }

    fn claim_pending(&self, name: &str) -> Result<PendingGuard<'_>, ViewError> {
        if !lock(&self.pending).insert(name.to_string()) {
            return Err(ViewError::ReplyPending(name.to_string()));
        }
        Ok(PendingGuard { pending: &self.pending, name: name.to_string() })
    }

    fn emit(&self, name: &str, phase: SendPhase) {
        if let Some(listener) = &self.on_phase {
            listener(name, phase);
        }
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
