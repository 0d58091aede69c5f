//! Message store: the ordered conversation list and its persistence.
//!
//! DESIGN
//! ======
//! Every mutation writes the full list back to storage before it is
//! committed in memory, so a failed write leaves both sides unchanged.
//! Conversation names are unique; messages only ever append.
//!
//! Corrupt persisted state is logged and replaced by the seed list rather
//! than failing startup.

use tracing::{info, warn};

use super::storage::{StateStorage, StorageError};
use super::types::{
    Conversation, ConversationKind, ConversationSummary, Message, NewConversation, ai_greeting, display_time,
    seed_conversations,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("a conversation named {0:?} already exists")]
    DuplicateName(String),

    #[error("conversation name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct MessageStore {
    conversations: Vec<Conversation>,
    storage: Box<dyn StateStorage>,
    clock: fn() -> String,
}

impl MessageStore {
    /// An empty store over `storage`. Call [`MessageStore::load`] to populate it.
    #[must_use]
    pub fn new(storage: Box<dyn StateStorage>) -> Self {
        Self { conversations: Vec::new(), storage, clock: display_time }
    }

    /// Replace the clock used to stamp appended messages.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    /// Load the persisted list, or the seed list when none exists or it is corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the storage cannot be read at all.
    pub fn load(&mut self) -> Result<&[Conversation], StoreError> {
        self.conversations = match self.storage.read()? {
            None => {
                info!("store: no persisted state, using seed conversations");
                seed_conversations()
            }
            Some(raw) => match decode(&raw) {
                Ok(list) => list,
                Err(e) => {
                    warn!(error = %e, "store: falling back to seed conversations");
                    seed_conversations()
                }
            },
        };
        Ok(&self.conversations)
    }

    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.name == name)
    }

    /// Append a message from `sender` to the conversation named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownConversation`] if no such conversation
    /// exists, or [`StoreError::Storage`] if persisting fails; in both cases
    /// the list is unchanged.
    pub fn append(&mut self, name: &str, sender: &str, text: &str) -> Result<&Message, StoreError> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownConversation(name.to_string()))?;

        let message = Message { username: sender.to_string(), message: text.to_string(), time: (self.clock)() };
        self.conversations[index].messages.push(message);
        if let Err(e) = self.persist(&self.conversations) {
            self.conversations[index].messages.pop();
            return Err(e);
        }

        let messages = &self.conversations[index].messages;
        Ok(&messages[messages.len() - 1])
    }

    /// Set and persist the entire list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateName`] if two conversations share a
    /// name, or [`StoreError::Storage`] if persisting fails.
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) -> Result<(), StoreError> {
        if let Some(name) = first_duplicate(&conversations) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        self.persist(&conversations)?;
        self.conversations = conversations;
        Ok(())
    }

    /// Create a conversation. AI conversations open with a greeting from the contact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyName`] or [`StoreError::DuplicateName`]
    /// before any mutation, or [`StoreError::Storage`] if persisting fails.
    pub fn create(&mut self, new: NewConversation) -> Result<&Conversation, StoreError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if self.get(name).is_some() {
            return Err(StoreError::DuplicateName(name.to_string()));
        }

        let mut conversation = Conversation::private(name);
        conversation.avatar = new.avatar;
        if let ConversationKind::Ai { model } = new.kind {
            conversation.messages.push(Message {
                username: name.to_string(),
                message: ai_greeting(name, &model),
                time: (self.clock)(),
            });
            conversation.ai = true;
            conversation.ai_model = Some(model);
        }

        let mut next = self.conversations.clone();
        next.push(conversation);
        self.replace_all(next)?;
        info!(name, "store: conversation created");
        Ok(&self.conversations[self.conversations.len() - 1])
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(Conversation::summary)
            .collect()
    }

    /// Sidebar filter: case-insensitive match on name or last message.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<ConversationSummary> {
        let needle = query.trim().to_lowercase();
        self.summaries()
            .into_iter()
            .filter(|s| {
                needle.is_empty()
                    || s.name.to_lowercase().contains(&needle)
                    || s.last_message.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn persist(&self, conversations: &[Conversation]) -> Result<(), StoreError> {
        let json = serde_json::to_string(conversations).map_err(StorageError::from)?;
        self.storage.write(&json)?;
        Ok(())
    }
}

/// Decode a persisted document, rejecting anything that violates the list invariants.
pub(crate) fn decode(raw: &str) -> Result<Vec<Conversation>, StorageError> {
    let list: Vec<Conversation> =
        serde_json::from_str(raw).map_err(|e| StorageError::CorruptState { reason: e.to_string() })?;
    if let Some(name) = first_duplicate(&list) {
        return Err(StorageError::CorruptState { reason: format!("duplicate conversation name {name:?}") });
    }
    Ok(list)
}

fn first_duplicate(conversations: &[Conversation]) -> Option<&str> {
    conversations.iter().enumerate().find_map(|(i, c)| {
        conversations[..i]
            .iter()
            .any(|earlier| earlier.name == c.name)
            .then_some(c.name.as_str())
    })
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
