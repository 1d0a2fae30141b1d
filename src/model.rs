//! Data models shared by the REST calls, the event stream and the UI state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message as persisted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Sidebar entry for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChatSummary {
    /// Most recent activity, used for ordering the history.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Body of `POST /api/chats` and `PUT /api/chats/:id`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatTitleBody<'a> {
    pub title: &'a str,
}

/// Body of `POST /api/chats/:id/messages`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SendMessageBody<'a> {
    pub content: &'a str,
}

/// Payload of a `user_message` or `complete` frame.
///
/// The role is implied by the event kind, so it is not read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedMessage {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl PersistedMessage {
    pub fn into_message(self, role: Role) -> Message {
        Message {
            id: self.id,
            role,
            content: self.content,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContentDelta {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorPayload {
    message: String,
}

/// One event of a message send.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The user's message as stored by the server.
    UserMessage(Message),
    /// The assistant has started working.
    Thinking,
    /// One incremental text fragment of the reply.
    Content(String),
    /// The final stored assistant message; supersedes all fragments.
    Complete(Message),
    /// The server gave up on the reply.
    Error(String),
}

impl StreamEvent {
    /// `complete` and `error` end a send; everything else is additive.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete(_) | StreamEvent::Error(_))
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::UserMessage(_) => "user_message",
            StreamEvent::Thinking => "thinking",
            StreamEvent::Content(_) => "content",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error(_) => "error",
        }
    }
}

/// `{"event": <kind>, "data": <payload>}` as it appears in a frame.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    /// Convert to a typed event. `Ok(None)` for kinds this client does not know.
    pub fn into_event(self) -> Result<Option<StreamEvent>, serde_json::Error> {
        let event = match self.event.as_str() {
            "user_message" => StreamEvent::UserMessage(
                serde_json::from_value::<PersistedMessage>(self.data)?.into_message(Role::User),
            ),
            "thinking" => StreamEvent::Thinking,
            "content" => StreamEvent::Content(serde_json::from_value::<ContentDelta>(self.data)?.content),
            "complete" => StreamEvent::Complete(
                serde_json::from_value::<PersistedMessage>(self.data)?.into_message(Role::Assistant),
            ),
            "error" => StreamEvent::Error(serde_json::from_value::<ErrorPayload>(self.data)?.message),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// A message as shown in the UI, including the transient thinking placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_thinking: bool,
}

impl From<Message> for DisplayMessage {
    fn from(msg: Message) -> Self {
        DisplayMessage {
            id: msg.id,
            role: msg.role,
            content: msg.content,
            timestamp: msg.timestamp,
            is_thinking: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> EventEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_user_message_envelope() {
        let event = envelope(json!({
            "event": "user_message",
            "data": {"id": "m1", "content": "Hello", "timestamp": "2024-05-01T10:00:00Z"}
        }))
        .into_event()
        .unwrap()
        .unwrap();

        match event {
            StreamEvent::UserMessage(msg) => {
                assert_eq!(msg.id, "m1");
                assert_eq!(msg.role, Role::User);
                assert_eq!(msg.content, "Hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_thinking_without_data() {
        let event = envelope(json!({"event": "thinking"})).into_event().unwrap();
        assert_eq!(event, Some(StreamEvent::Thinking));

        let event = envelope(json!({"event": "thinking", "data": {}})).into_event().unwrap();
        assert_eq!(event, Some(StreamEvent::Thinking));
    }

    #[test]
    fn test_complete_is_assistant_and_terminal() {
        let event = envelope(json!({
            "event": "complete",
            "data": {"id": "m2", "content": "Hi there", "timestamp": "2024-05-01T10:00:05Z"}
        }))
        .into_event()
        .unwrap()
        .unwrap();

        assert!(event.is_terminal());
        assert_eq!(event.kind(), "complete");
        match event {
            StreamEvent::Complete(msg) => assert_eq!(msg.role, Role::Assistant),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        let event = envelope(json!({"event": "ping", "data": {}})).into_event().unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn test_payload_mismatch_is_an_error() {
        let result = envelope(json!({"event": "content", "data": {"text": "oops"}})).into_event();
        assert!(result.is_err());
    }

    #[test]
    fn test_chat_summary_camel_case() {
        let chat: ChatSummary = serde_json::from_value(json!({
            "id": "c1",
            "title": "First",
            "createdAt": "2024-05-01T10:00:00Z",
            "messageCount": 3
        }))
        .unwrap();
        assert_eq!(chat.title, "First");
        assert_eq!(chat.updated_at, None);
        assert_eq!(chat.last_activity(), chat.created_at);
    }
}
