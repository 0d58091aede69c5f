//! Conversation data model and the persisted JSON shape.
//!
//! Field names follow the persisted layout (`username`, `aiModel`) so state
//! written by earlier clients keeps loading.

use serde::{Deserialize, Serialize};

/// Sender identity of the local user.
pub const LOCAL_USER: &str = "me";

/// Model given to new AI conversations when none is chosen.
pub const DEFAULT_AI_MODEL: &str = "gpt-4";

/// One chat line. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender identifier: [`LOCAL_USER`] or the contact's name.
    pub username: String,
    pub message: String,
    /// Display time `HH:MM`; not sortable.
    pub time: String,
}

/// A named thread of messages, optionally AI-backed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique display name; doubles as the conversation identifier.
    #[serde(rename = "username")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub ai: bool,
    #[serde(rename = "aiModel", default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
}

impl Conversation {
    /// A human conversation with no messages.
    #[must_use]
    pub fn private(name: impl Into<String>) -> Self {
        Self { name: name.into(), avatar: None, messages: Vec::new(), ai: false, ai_model: None }
    }

    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Sidebar row for this conversation.
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        let (last_message, last_time) = self
            .last_message()
            .map(|m| (m.message.clone(), m.time.clone()))
            .unwrap_or_default();
        ConversationSummary {
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            ai: self.ai,
            last_message,
            last_time,
        }
    }
}

/// Sidebar projection of a conversation: name plus last-message preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub name: String,
    pub avatar: Option<String>,
    pub ai: bool,
    /// Empty when the conversation has no messages.
    pub last_message: String,
    pub last_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationKind {
    Private,
    Ai { model: String },
}

/// Request to create a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub name: String,
    pub avatar: Option<String>,
    pub kind: ConversationKind,
}

impl NewConversation {
    #[must_use]
    pub fn private(name: impl Into<String>) -> Self {
        Self { name: name.into(), avatar: None, kind: ConversationKind::Private }
    }

    #[must_use]
    pub fn ai(name: impl Into<String>, model: Option<&str>) -> Self {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_AI_MODEL)
            .to_string();
        Self { name: name.into(), avatar: None, kind: ConversationKind::Ai { model } }
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Greeting an AI contact opens its conversation with.
#[must_use]
pub fn ai_greeting(name: &str, model: &str) -> String {
    format!("Hi! I'm {name} ({model}) 🤖")
}

// =============================================================================
// SEED
// =============================================================================

fn seeded(name: &str, lines: &[(&str, &str, &str)]) -> Conversation {
    let messages = lines
        .iter()
        .map(|(from, text, time)| Message {
            username: (*from).to_string(),
            message: (*text).to_string(),
            time: (*time).to_string(),
        })
        .collect();
    Conversation { messages, ..Conversation::private(name) }
}

/// Conversation list used when nothing usable is persisted.
#[must_use]
pub fn seed_conversations() -> Vec<Conversation> {
    vec![
        seeded(
            "alice",
            &[
                ("alice", "Hello! How are you?", "10:00"),
                ("me", "I'm good, thanks! And you?", "10:01"),
                ("alice", "Doing great! Working on a project.", "10:02"),
                ("me", "Nice! Need any help?", "10:03"),
                ("alice", "Maybe later, thanks!", "10:04"),
            ],
        ),
        seeded(
            "bob",
            &[
                ("bob", "Hey!", "09:00"),
                ("me", "Hi Bob!", "09:01"),
                ("bob", "How's your day?", "09:02"),
                ("me", "Pretty good, you?", "09:03"),
                ("bob", "All good here!", "09:04"),
            ],
        ),
        seeded(
            "charlie",
            &[
                ("charlie", "Yo!", "08:00"),
                ("me", "Hey Charlie!", "08:01"),
                ("charlie", "Want to play chess?", "08:02"),
                ("me", "Sure, let's go!", "08:03"),
            ],
        ),
        seeded(
            "dave",
            &[
                ("dave", "Hi!", "07:00"),
                ("me", "Hey Dave!", "07:01"),
                ("dave", "Need help with code?", "07:02"),
                ("me", "Yes, please!", "07:03"),
            ],
        ),
        seeded(
            "eve",
            &[
                ("eve", "Hello!", "06:00"),
                ("me", "Hi Eve!", "06:01"),
                ("eve", "See you later.", "06:02"),
                ("me", "Bye!", "06:03"),
            ],
        ),
    ]
}

/// Current local wall-clock time as `HH:MM`, falling back to UTC when the
/// local offset cannot be determined.
#[must_use]
pub fn display_time() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    format!("{:02}:{:02}", now.hour(), now.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_names_are_unique() {
        let seed = seed_conversations();
        let mut names: Vec<_> = seed.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), seed.len());
        assert!(seed.iter().all(|c| !c.ai));
    }

    #[test]
    fn conversation_reads_legacy_layout() {
        let raw = r#"{"username":"zed","messages":[{"username":"zed","message":"yo","time":"11:00"}]}"#;
        let conv: Conversation = serde_json::from_str(raw).unwrap();
        assert_eq!(conv.name, "zed");
        assert!(!conv.ai);
        assert_eq!(conv.ai_model, None);
        assert_eq!(conv.messages.len(), 1);
    }

    #[test]
    fn conversation_writes_wire_names() {
        let conv = Conversation { ai: true, ai_model: Some("gpt-4".into()), ..Conversation::private("bot") };
        let json = serde_json::to_value(&conv).unwrap();
        assert_eq!(json["username"], "bot");
        assert_eq!(json["aiModel"], "gpt-4");
        assert!(json.get("avatar").is_none());
    }

    #[test]
    fn summary_of_empty_conversation_has_blank_preview() {
        let summary = Conversation::private("new").summary();
        assert_eq!(summary.last_message, "");
        assert_eq!(summary.last_time, "");
    }

    #[test]
    fn new_ai_conversation_defaults_model() {
        let new = NewConversation::ai("bot", None);
        assert_eq!(new.kind, ConversationKind::Ai { model: DEFAULT_AI_MODEL.into() });
        let new = NewConversation::ai("bot", Some("gpt-3.5"));
        assert_eq!(new.kind, ConversationKind::Ai { model: "gpt-3.5".into() });
    }

    #[test]
    fn greeting_names_contact_and_model() {
        assert_eq!(ai_greeting("Ada", "gpt-4"), "Hi! I'm Ada (gpt-4) 🤖");
    }

    #[test]
    fn display_time_is_hh_mm() {
        let t = display_time();
        assert_eq!(t.len(), 5);
        assert_eq!(&t[2..3], ":");
    }
}
