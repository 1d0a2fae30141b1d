//! Core backend traits and error types.

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use thiserror::Error;

use crate::model::{ChatSummary, Message, StreamEvent};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SSE line exceeds {limit} bytes ({pending} pending)")]
    FrameTooLarge { limit: usize, pending: usize },

    #[error("Stream failed: {0}")]
    Stream(String),

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("Stream task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("A message is already being sent in this conversation")]
    SendInProgress,
}

impl ClientError {
    /// The HTTP status behind this error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Events of one message send, in arrival order.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ClientError>>;

/// REST surface of the chat backend.
///
/// Every call fails with [`ClientError`] when the server answers with a
/// non-success status; callers treat such a failure as the operation not
/// having happened.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /api/chats`
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError>;

    /// `POST /api/chats`
    async fn create_chat(&self, title: &str) -> Result<ChatSummary, ClientError>;

    /// `GET /api/chats/:id`
    async fn get_chat(&self, chat_id: &str) -> Result<ChatSummary, ClientError>;

    /// `PUT /api/chats/:id`
    async fn update_chat(&self, chat_id: &str, title: &str) -> Result<ChatSummary, ClientError>;

    /// `DELETE /api/chats/:id`
    async fn delete_chat(&self, chat_id: &str) -> Result<(), ClientError>;

    /// `GET /api/chats/:id/messages`
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, ClientError>;
}

/// Extension trait for backends that stream assistant replies.
///
/// Kept separate from [`ChatApi`] the same way a streaming provider extends a
/// plain one: the streaming half is the only part the stream client needs.
#[async_trait]
pub trait StreamingChatApi: ChatApi {
    /// `POST /api/chats/:id/messages`, answered with an SSE body.
    ///
    /// Resolves once response headers arrive. A non-success status is an
    /// error here; transport failures while reading the body show up as `Err`
    /// items in the returned stream. Malformed frames and unknown event kinds
    /// never appear in the stream.
    async fn send_message_stream(
        &self,
        chat_id: &str,
        content: &str,
    ) -> Result<EventStream, ClientError>;
}

/// Reject the empty identifiers and message bodies the backend cannot accept.
pub(crate) fn validate_send(chat_id: &str, content: &str) -> Result<(), ClientError> {
    if chat_id.trim().is_empty() {
        return Err(ClientError::InvalidArgument("chat id must not be empty".to_string()));
    }
    if content.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "message content must not be empty".to_string(),
        ));
    }
    Ok(())
}
