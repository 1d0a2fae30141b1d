//! Callback-driven streaming of one message send.
//!
//! [`start_stream`] issues the send on a background task and returns a
//! [`StreamHandle`] right away. Events are dispatched to a [`StreamCallbacks`]
//! implementation in arrival order: `user_message`, `thinking`, any number of
//! `content`, then exactly one of `complete` or `error`. Cancelling the handle
//! suppresses everything after it, including the terminal callback.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{validate_send, ClientError, EventStream, StreamingChatApi};
use crate::model::{Message, StreamEvent};

/// Per-event-kind callbacks. All methods default to doing nothing.
pub trait StreamCallbacks: Send {
    fn on_user_message(&mut self, _message: Message) {}

    fn on_thinking(&mut self) {}

    fn on_content(&mut self, _fragment: String) {}

    fn on_complete(&mut self, _message: Message) {}

    fn on_error(&mut self, _message: String) {}

    /// Deliver `event` unless `token` is already cancelled. Returns whether it was delivered.
    ///
    /// Wrappers that can block before reaching the callbacks must re-check the
    /// token once they can deliver, so nothing lands after `abort()` returns.
    fn deliver(&mut self, event: StreamEvent, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        dispatch(self, event);
        true
    }
}

/// Lets a UI read the consumer while the stream task mutates it.
///
/// The token is checked again after the lock is taken: a caller holding the
/// lock can abort and clean up, and the pending event is then dropped.
impl<C: StreamCallbacks> StreamCallbacks for Arc<Mutex<C>> {
    fn on_user_message(&mut self, message: Message) {
        lock_callbacks(self).on_user_message(message);
    }

    fn on_thinking(&mut self) {
        lock_callbacks(self).on_thinking();
    }

    fn on_content(&mut self, fragment: String) {
        lock_callbacks(self).on_content(fragment);
    }

    fn on_complete(&mut self, message: Message) {
        lock_callbacks(self).on_complete(message);
    }

    fn on_error(&mut self, message: String) {
        lock_callbacks(self).on_error(message);
    }

    fn deliver(&mut self, event: StreamEvent, token: &CancellationToken) -> bool {
        let mut inner = lock_callbacks(self);
        if token.is_cancelled() {
            return false;
        }
        dispatch(&mut *inner, event);
        true
    }
}

/// A panic in an earlier callback poisons the lock; keep delivering to the state it left.
fn lock_callbacks<C>(callbacks: &Mutex<C>) -> MutexGuard<'_, C> {
    callbacks.lock().unwrap_or_else(|poisoned| {
        warn!("stream callbacks lock poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Route one event to its callback.
pub fn dispatch<C: StreamCallbacks + ?Sized>(callbacks: &mut C, event: StreamEvent) {
    match event {
        StreamEvent::UserMessage(message) => callbacks.on_user_message(message),
        StreamEvent::Thinking => callbacks.on_thinking(),
        StreamEvent::Content(fragment) => callbacks.on_content(fragment),
        StreamEvent::Complete(message) => callbacks.on_complete(message),
        StreamEvent::Error(message) => callbacks.on_error(message),
    }
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `complete` was delivered.
    Completed,
    /// `error` was delivered, either from the server or for a transport failure.
    Failed(String),
    /// The handle was aborted before a terminal event; nothing further was delivered.
    Cancelled,
    /// The body ended without a terminal event. No terminal callback fired.
    Ended,
}

impl StreamOutcome {
    /// Collapse into a `Result`. A stream that ended without a terminal event
    /// counts as success.
    pub fn into_result(self) -> Result<(), ClientError> {
        match self {
            StreamOutcome::Completed | StreamOutcome::Ended => Ok(()),
            StreamOutcome::Failed(message) => Err(ClientError::Stream(message)),
            StreamOutcome::Cancelled => Err(ClientError::StreamCancelled),
        }
    }
}

/// Cancellation handle for one in-flight send.
///
/// Dropping the handle does not cancel the stream.
pub struct StreamHandle<C> {
    token: CancellationToken,
    task: JoinHandle<(C, StreamOutcome)>,
}

impl<C> StreamHandle<C> {
    /// Stop the stream at its next suspension point.
    ///
    /// Safe to call any number of times, and after the stream has finished.
    pub fn abort(&self) {
        if !self.token.is_cancelled() {
            debug!("aborting message stream");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the stream has stopped delivering callbacks.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A token that aborts this stream when cancelled, e.g. from a UI stop button.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the stream to stop and take the callbacks back.
    pub async fn join(self) -> Result<(C, StreamOutcome), ClientError> {
        Ok(self.task.await?)
    }
}

/// Start streaming the reply to `content` in chat `chat_id`.
///
/// Returns immediately; the request is issued on a spawned tokio task.
/// Fails synchronously only for empty arguments or when called outside a
/// tokio runtime.
///
/// # Example
/// ```no_run
/// use chatwire::api::HttpChatClient;
/// use chatwire::options::ClientOptions;
/// use chatwire::stream::{start_stream, StreamCallbacks};
///
/// struct Printer;
///
/// impl StreamCallbacks for Printer {
///     fn on_content(&mut self, fragment: String) {
///         print!("{}", fragment);
///     }
/// }
///
/// # async fn run() -> Result<(), chatwire::ClientError> {
/// let client = HttpChatClient::new(ClientOptions::from_env())?;
/// let handle = start_stream(client, "chat-1", "Hello", Printer)?;
/// let (_printer, outcome) = handle.join().await?;
/// println!("\n{:?}", outcome);
/// # Ok(())
/// # }
/// ```
pub fn start_stream<A, C>(
    api: A,
    chat_id: impl Into<String>,
    content: impl Into<String>,
    callbacks: C,
) -> Result<StreamHandle<C>, ClientError>
where
    A: StreamingChatApi + 'static,
    C: StreamCallbacks + 'static,
{
    let chat_id = chat_id.into();
    let content = content.into();
    validate_send(&chat_id, &content)?;

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| ClientError::Config("streaming requires a tokio runtime".to_string()))?;

    let token = CancellationToken::new();
    let task_token = token.clone();
    let mut callbacks = callbacks;

    let task = runtime.spawn(async move {
        let outcome = run_stream(&api, &chat_id, &content, &mut callbacks, &task_token).await;
        debug!(chat_id = %chat_id, outcome = ?outcome, "message stream finished");
        (callbacks, outcome)
    });

    Ok(StreamHandle { token, task })
}

/// Open the stream and consume it, honoring `token` throughout.
pub async fn run_stream<A, C>(
    api: &A,
    chat_id: &str,
    content: &str,
    callbacks: &mut C,
    token: &CancellationToken,
) -> StreamOutcome
where
    A: StreamingChatApi + ?Sized,
    C: StreamCallbacks + ?Sized,
{
    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => return StreamOutcome::Cancelled,
        opened = api.send_message_stream(chat_id, content) => opened,
    };

    match opened {
        Ok(events) => consume_events(events, callbacks, token).await,
        Err(_) if token.is_cancelled() => StreamOutcome::Cancelled,
        Err(e) => fail(callbacks, e, token),
    }
}

/// Dispatch events until a terminal event, the end of the stream, a transport
/// failure or cancellation.
pub async fn consume_events<C>(
    mut events: EventStream,
    callbacks: &mut C,
    token: &CancellationToken,
) -> StreamOutcome
where
    C: StreamCallbacks + ?Sized,
{
    let mut seen_user_message = false;
    let mut seen_content = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return StreamOutcome::Cancelled,
            next = events.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(_)) if token.is_cancelled() => return StreamOutcome::Cancelled,
            Some(Err(e)) => return fail(callbacks, e, token),
            None => return StreamOutcome::Ended,
        };

        match &event {
            StreamEvent::UserMessage(_) if seen_user_message => {
                debug!("ignoring repeated user_message event");
                continue;
            }
            StreamEvent::UserMessage(_) => seen_user_message = true,
            StreamEvent::Thinking if seen_content => {
                debug!("ignoring thinking event after content");
                continue;
            }
            StreamEvent::Content(_) => seen_content = true,
            _ => {}
        }

        debug!(kind = event.kind(), "dispatching stream event");

        let outcome = match &event {
            StreamEvent::Complete(_) => Some(StreamOutcome::Completed),
            StreamEvent::Error(message) => Some(StreamOutcome::Failed(message.clone())),
            _ => None,
        };

        if !callbacks.deliver(event, token) {
            return StreamOutcome::Cancelled;
        }

        if let Some(outcome) = outcome {
            return outcome;
        }
    }
}

fn fail<C: StreamCallbacks + ?Sized>(
    callbacks: &mut C,
    error: ClientError,
    token: &CancellationToken,
) -> StreamOutcome {
    let message = error.to_string();
    warn!(error = %message, "message stream failed");
    if callbacks.deliver(StreamEvent::Error(message.clone()), token) {
        StreamOutcome::Failed(message)
    } else {
        StreamOutcome::Cancelled
    }
}
