use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use super::*;
use crate::chat::client::tests::{MockRelay, failed, ok};
use crate::chat::client::{ClientError, RelayTransport};
use crate::chat::linkage::ResponseLinkage;
use crate::chat::storage::{MemoryStorage, StateStorage, StorageError};
use crate::routes::chat::{RelayRequest, RelayResponse};

const AI_ALICE: &str = r#"[
    {"username":"alice","messages":[],"ai":true,"aiModel":"gpt-4"},
    {"username":"bob","messages":[]}
]"#;

fn fixed_clock() -> String {
    "09:30".to_string()
}

fn view_over(relay: Arc<dyn RelayTransport>, state: &str) -> ConversationView {
    let store = MessageStore::new(Box::new(MemoryStorage::with_contents(state))).with_clock(fixed_clock);
    let client = AiResponseClient::new(relay, Arc::new(ResponseLinkage::new()));
    let view = ConversationView::new(store, client);
    view.load().unwrap();
    view
}

fn bodies(view: &ConversationView, name: &str) -> Vec<(String, String)> {
    view.conversation(name)
        .unwrap()
        .messages
        .into_iter()
        .map(|m| (m.username, m.message))
        .collect()
}

// =============================================================================
// Human conversations
// =============================================================================

#[tokio::test]
async fn human_conversation_skips_relay() {
    let relay = Arc::new(MockRelay::new(vec![]));
    let view = view_over(relay.clone(), AI_ALICE);

    let outcome = view.send_to("bob", "hey").await.unwrap();

    assert_eq!(outcome, SendOutcome::Delivered);
    assert_eq!(bodies(&view, "bob"), [("me".to_string(), "hey".to_string())]);
    assert!(relay.recorded().is_empty());
}

// =============================================================================
// AI conversations
// =============================================================================

#[tokio::test]
async fn ai_reply_is_appended_after_user_message() {
    let relay = Arc::new(MockRelay::new(vec![Ok(ok("Hi", "r1"))]));
    let view = view_over(relay.clone(), AI_ALICE);

    let outcome = view.send_to("alice", "hello").await.unwrap();

    assert_eq!(outcome, SendOutcome::Replied("Hi".into()));
    assert_eq!(
        bodies(&view, "alice"),
        [("me".to_string(), "hello".to_string()), ("alice".to_string(), "Hi".to_string())]
    );
    assert_eq!(relay.recorded()[0].model.as_deref(), Some("gpt-4"));
    assert_eq!(view.client().linkage().get("alice").as_deref(), Some("r1"));
    assert!(!view.is_awaiting_reply("alice"));
}

#[tokio::test]
async fn relay_failure_appends_fallback_and_keeps_linkage() {
    let relay = Arc::new(MockRelay::new(vec![Ok(ok("first", "r1")), Err(failed(500))]));
    let view = view_over(relay, AI_ALICE);

    view.send_to("alice", "one").await.unwrap();
    let outcome = view.send_to("alice", "two").await.unwrap();

    assert!(matches!(outcome, SendOutcome::FallbackShown { ref reason } if reason.contains("500")));
    let last = bodies(&view, "alice").pop().unwrap();
    assert_eq!(last, ("alice".to_string(), FALLBACK_REPLY.to_string()));
    assert_eq!(view.client().linkage().get("alice").as_deref(), Some("r1"));
    assert!(!view.is_awaiting_reply("alice"));
}

#[tokio::test]
async fn ai_conversation_without_model_lets_relay_default() {
    let relay = Arc::new(MockRelay::new(vec![]));
    let view = view_over(relay.clone(), r#"[{"username":"bot","ai":true}]"#);

    view.send_to("bot", "hi").await.unwrap();

    assert_eq!(relay.recorded()[0].model, None);
}

#[tokio::test]
async fn phases_follow_send_state_machine() {
    let phases = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = phases.clone();
    let relay = Arc::new(MockRelay::new(vec![Ok(ok("Hi", "r1")), Err(failed(503))]));
    let view = view_over(relay, AI_ALICE).with_phase_listener(move |_, phase| seen.lock().unwrap().push(phase));

    view.send_to("alice", "a").await.unwrap();
    view.send_to("alice", "b").await.unwrap();
    view.send_to("bob", "c").await.unwrap();

    use SendPhase::*;
    assert_eq!(
        *phases.lock().unwrap(),
        [
            UserMessageAppended,
            AwaitingReply,
            ReplyAppended,
            Idle,
            UserMessageAppended,
            AwaitingReply,
            FailureAppended,
            Idle,
            UserMessageAppended,
            Idle,
        ]
    );
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn unknown_conversation_is_an_error() {
    let view = view_over(Arc::new(MockRelay::new(vec![])), AI_ALICE);
    let err = view.send_to("zed", "hi").await.unwrap_err();
    assert!(matches!(err, ViewError::Store(StoreError::UnknownConversation(_))));
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let view = view_over(Arc::new(MockRelay::new(vec![])), AI_ALICE);
    assert!(matches!(view.send_to("bob", "  ").await, Err(ViewError::EmptyMessage)));
    assert!(bodies(&view, "bob").is_empty());
}

/// Relay that holds every request until the gate is opened.
struct GatedRelay {
    gate: Notify,
}

#[async_trait::async_trait]
impl RelayTransport for GatedRelay {
    async fn send(&self, _request: &RelayRequest) -> Result<RelayResponse, ClientError> {
        self.gate.notified().await;
        Ok(ok("late", "r1"))
    }
}

#[tokio::test]
async fn second_send_while_awaiting_reply_is_rejected() {
    let relay = Arc::new(GatedRelay { gate: Notify::new() });
    let view = view_over(relay.clone(), AI_ALICE);

    let first = view.send_to("alice", "one");
    let second = async {
        tokio::task::yield_now().await;
        assert!(view.is_awaiting_reply("alice"));
        let result = view.send_to("alice", "two").await;
        relay.gate.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), SendOutcome::Replied("late".into()));
    assert!(matches!(second, Err(ViewError::ReplyPending(name)) if name == "alice"));
    assert_eq!(
        bodies(&view, "alice"),
        [("me".to_string(), "one".to_string()), ("alice".to_string(), "late".to_string())]
    );
}

// =============================================================================
// Selection and creation
// =============================================================================

#[tokio::test]
async fn send_uses_selected_conversation() {
    let view = view_over(Arc::new(MockRelay::new(vec![])), AI_ALICE);
    assert_eq!(view.selected(), INITIAL_SELECTION);

    view.select("bob").unwrap();
    view.send("yo").await.unwrap();

    assert_eq!(bodies(&view, "bob").len(), 1);
    assert!(view.select("nobody").is_err());
    assert_eq!(view.selected(), "bob");
}

#[test]
fn create_selects_new_conversation() {
    let view = view_over(Arc::new(MockRelay::new(vec![])), AI_ALICE);
    view.create(NewConversation::ai("Ada", None)).unwrap();
    assert_eq!(view.selected(), "Ada");
    assert_eq!(view.summaries().len(), 3);
}

#[test]
fn create_duplicate_keeps_selection_and_list() {
    let view = view_over(Arc::new(MockRelay::new(vec![])), AI_ALICE);
    let err = view.create(NewConversation::private("bob")).unwrap_err();
    assert!(matches!(err, ViewError::Store(StoreError::DuplicateName(_))));
    assert_eq!(view.selected(), INITIAL_SELECTION);
    assert_eq!(view.summaries().len(), 2);
}

// =============================================================================
// Storage failures
// =============================================================================

/// Accepts the first `ok_writes` writes, then reports a full disk.
struct FailAfter {
    state: &'static str,
    ok_writes: usize,
    writes: AtomicUsize,
}

impl StateStorage for FailAfter {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(Some(self.state.to_string()))
    }

    fn write(&self, _contents: &str) -> Result<(), StorageError> {
        if self.writes.fetch_add(1, Ordering::SeqCst) < self.ok_writes {
            Ok(())
        } else {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }
    }
}

fn view_failing_after(relay: Arc<dyn RelayTransport>, ok_writes: usize) -> ConversationView {
    let storage = FailAfter { state: AI_ALICE, ok_writes, writes: AtomicUsize::new(0) };
    let store = MessageStore::new(Box::new(storage)).with_clock(fixed_clock);
    let view = ConversationView::new(store, AiResponseClient::new(relay, Arc::new(ResponseLinkage::new())));
    view.load().unwrap();
    view
}

#[tokio::test]
async fn unstored_reply_does_not_advance_linkage() {
    let relay = Arc::new(MockRelay::new(vec![Ok(ok("Hi", "r1"))]));
    let view = view_failing_after(relay, 1);

    let err = view.send_to("alice", "hello").await.unwrap_err();

    assert!(matches!(err, ViewError::Store(StoreError::Storage(StorageError::Io(_)))));
    assert_eq!(bodies(&view, "alice"), [("me".to_string(), "hello".to_string())]);
    assert_eq!(view.client().linkage().get("alice"), None);
    assert!(!view.is_awaiting_reply("alice"));
}

#[tokio::test]
async fn unstored_reply_restores_earlier_linkage() {
    let relay = Arc::new(MockRelay::new(vec![Ok(ok("one", "r1")), Ok(ok("two", "r2"))]));
    let view = view_failing_after(relay.clone(), 3);

    view.send_to("alice", "first").await.unwrap();
    assert!(view.send_to("alice", "second").await.is_err());

    assert_eq!(view.client().linkage().get("alice").as_deref(), Some("r1"));
    assert_eq!(relay.recorded()[1].last_id.as_deref(), Some("r1"));
}
