//! # chatwire - Chat backend client with streamed assistant replies
//!
//! Client side of a chat application: REST calls for chat and message CRUD,
//! and a Server-Sent Events (SSE) stream client that assembles an assistant
//! reply from `user_message`, `thinking`, `content`, `complete` and `error`
//! frames, with cancellation mid-stream.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Trait-based backend (`ChatApi`, `StreamingChatApi`) with an HTTP implementation
//! - Chunk-boundary-safe SSE frame reassembly
//! - Idempotent cancellation handles
//! - A message-list state machine (`Conversation`) driven by stream callbacks
//! - Date grouping of the chat history
//!
//! ## Example
//! ```no_run
//! use chatwire::api::HttpChatClient;
//! use chatwire::client::ChatApi;
//! use chatwire::conversation::Conversation;
//! use chatwire::options::ClientOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpChatClient::new(ClientOptions::new("http://localhost:3001"))?;
//!
//!     let chat = client.create_chat("New chat").await?;
//!
//!     let mut conversation = Conversation::new(chat.id.clone());
//!     conversation.begin_send()?;
//!
//!     let handle = client.start_stream(&chat.id, "Hello!", conversation)?;
//!     let (conversation, outcome) = handle.join().await?;
//!
//!     for message in conversation.messages() {
//!         println!("{:?}: {}", message.role, message.content);
//!     }
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod conversation;
pub mod history;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use api::HttpChatClient;
pub use client::{ChatApi, ClientError, StreamingChatApi};
pub use conversation::Conversation;
pub use model::{ChatSummary, Message, StreamEvent};
pub use stream::{start_stream, StreamCallbacks, StreamHandle, StreamOutcome};
