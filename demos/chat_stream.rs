//! Stream one reply from a running chat backend.
//!
//! Run with:
//! ```bash
//! export CHATWIRE_API_URL="http://localhost:3001"
//! cargo run --example chat_stream -- "Write a haiku about Rust programming."
//! ```
//!
//! Press Ctrl-C to stop the reply mid-stream.

use std::io::Write;

use chatwire::api::HttpChatClient;
use chatwire::client::ChatApi;
use chatwire::history::group_chats;
use chatwire::model::Message;
use chatwire::options::ClientOptions;
use chatwire::stream::{StreamCallbacks, StreamOutcome};
use tracing_subscriber::EnvFilter;

/// Prints the reply as it arrives.
struct Printer;

impl StreamCallbacks for Printer {
    fn on_user_message(&mut self, message: Message) {
        println!("You: {}\n", message.content);
    }

    fn on_thinking(&mut self) {
        print!("Assistant is thinking...\r");
        let _ = std::io::stdout().flush();
    }

    fn on_content(&mut self, fragment: String) {
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
    }

    fn on_complete(&mut self, message: Message) {
        println!("\n\n=== Stored as {} ===", message.id);
    }

    fn on_error(&mut self, message: String) {
        eprintln!("\nError in stream: {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about Rust programming.".to_string());

    let client = HttpChatClient::new(ClientOptions::from_env())?;

    let chats = client.list_chats().await?;
    for (group, chats) in group_chats(&chats, chrono::Utc::now()) {
        println!("{}", group);
        for chat in chats {
            println!("  {}", chat.title);
        }
    }

    let chat = client.create_chat("Streaming demo").await?;
    let handle = client.start_stream(&chat.id, &prompt, Printer)?;

    let stop = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    let (_, outcome) = handle.join().await?;
    if outcome == StreamOutcome::Cancelled {
        println!("\n\n=== Stopped ===");
    }

    Ok(())
}
