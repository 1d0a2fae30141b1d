//! Message-list state for one open chat.
//!
//! A [`Conversation`] turns the callback sequence of a send into list
//! mutations: the user bubble appears when the server confirms it, a
//! thinking placeholder stands in for the assistant until text arrives, the
//! streamed text is replaced wholesale by the stored reply on `complete`, and
//! everything provisional is rolled back on `error`.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::client::ClientError;
use crate::model::{DisplayMessage, Message, Role};
use crate::stream::StreamCallbacks;

/// Progress of the current send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendState {
    Idle,
    /// Request issued, nothing received yet.
    Sending,
    /// At least one event received.
    Streaming,
    /// A terminal event arrived.
    Settled(Result<(), String>),
}

#[derive(Debug, Clone)]
pub struct Conversation {
    chat_id: String,
    messages: Vec<DisplayMessage>,
    state: SendState,
    /// Local correlation key for the in-flight assistant message. Never persisted.
    temp_id: Option<String>,
    error: Option<String>,
}

impl Conversation {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
            state: SendState::Idle,
            temp_id: None,
            error: None,
        }
    }

    /// Seed the list with stored messages, e.g. from `GET /api/chats/:id/messages`.
    pub fn with_history(chat_id: impl Into<String>, history: Vec<Message>) -> Self {
        let mut conversation = Self::new(chat_id);
        conversation.messages = history.into_iter().map(DisplayMessage::from).collect();
        conversation
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn state(&self) -> &SendState {
        &self.state
    }

    /// Error banner text, if one is showing.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while the send affordance should be disabled.
    pub fn is_sending(&self) -> bool {
        matches!(self.state, SendState::Sending | SendState::Streaming)
    }

    /// Claim the conversation for a new send and allocate its temporary id.
    ///
    /// Only one send may be in flight per conversation. `thinking` and
    /// `content` events are ignored unless a send is in flight.
    pub fn begin_send(&mut self) -> Result<(), ClientError> {
        if self.is_sending() {
            return Err(ClientError::SendInProgress);
        }
        self.state = SendState::Sending;
        self.temp_id = Some(Uuid::new_v4().to_string());
        self.error = None;
        Ok(())
    }

    /// Clear provisional state after an explicit abort. Cancellation shows no error.
    pub fn cancel_send(&mut self) {
        self.remove_temporary();
        self.temp_id = None;
        self.state = SendState::Idle;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Surface a failure that happened outside a stream, such as a REST call.
    pub fn show_error(&mut self, error: &ClientError) {
        self.error = Some(error.to_string());
    }

    /// Temporary id of the send in flight, if any. Cancelled and settled sends have none.
    fn active_temp_id(&self) -> Option<String> {
        if self.is_sending() {
            self.temp_id.clone()
        } else {
            None
        }
    }

    fn mark_streaming(&mut self) {
        if matches!(self.state, SendState::Idle | SendState::Sending) {
            self.state = SendState::Streaming;
        }
    }

    fn remove_temporary(&mut self) {
        if let Some(temp_id) = &self.temp_id {
            self.messages.retain(|m| &m.id != temp_id);
        }
    }

    fn settle(&mut self, result: Result<(), String>) {
        self.remove_temporary();
        self.temp_id = None;
        self.state = SendState::Settled(result);
    }
}

impl StreamCallbacks for Conversation {
    fn on_user_message(&mut self, message: Message) {
        self.mark_streaming();
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(id = %message.id, "user message already present");
            return;
        }
        self.messages.push(message.into());
    }

    fn on_thinking(&mut self) {
        let Some(id) = self.active_temp_id() else {
            debug!("ignoring thinking event with no send in flight");
            return;
        };
        self.mark_streaming();
        if self.messages.iter().any(|m| m.id == id) {
            return;
        }
        self.messages.push(DisplayMessage {
            id,
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            is_thinking: true,
        });
    }

    fn on_content(&mut self, fragment: String) {
        let Some(id) = self.active_temp_id() else {
            debug!("ignoring content event with no send in flight");
            return;
        };
        self.mark_streaming();

        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(existing) if !existing.is_thinking => existing.content.push_str(&fragment),
            Some(placeholder) => {
                *placeholder = DisplayMessage {
                    id,
                    role: Role::Assistant,
                    content: fragment,
                    timestamp: Utc::now(),
                    is_thinking: false,
                };
            }
            None => self.messages.push(DisplayMessage {
                id,
                role: Role::Assistant,
                content: fragment,
                timestamp: Utc::now(),
                is_thinking: false,
            }),
        }
    }

    fn on_complete(&mut self, message: Message) {
        self.settle(Ok(()));
        if !self.messages.iter().any(|m| m.id == message.id) {
            self.messages.push(message.into());
        }
    }

    fn on_error(&mut self, message: String) {
        self.settle(Err(message.clone()));
        self.error = Some(message);
    }
}
