//! Server-Sent Events (SSE) frame reassembly and parsing.
//!
//! The message-append endpoint answers with frames of the form:
//! ```text
//! data: {"event": "user_message", "data": {...}}
//!
//! data: {"event": "content", "data": {"content": "Hi "}}
//!
//! data: [DONE]
//! ```
//!
//! Network chunks can split a frame anywhere, including inside a multi-byte
//! character, so bytes are buffered and only complete lines are decoded.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::model::{EventEnvelope, StreamEvent};

/// Longest line accepted before the stream is treated as broken.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Buffers partial lines across read chunks.
///
/// # Example
/// ```
/// use chatwire::sse::FrameReassembler;
///
/// let mut reassembler = FrameReassembler::new();
/// assert!(reassembler.push(b"data: {\"ev").unwrap().is_empty());
/// assert_eq!(
///     reassembler.push(b"ent\": 1}\n").unwrap(),
///     vec!["data: {\"event\": 1}".to_string()]
/// );
/// ```
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassembler that rejects unterminated lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Append a chunk and return every line it completed, without terminators.
    ///
    /// Fails once the pending unterminated line exceeds the length limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ClientError> {
        self.buffer.extend_from_slice(chunk);

        let lines = match self.buffer.iter().rposition(|b| *b == b'\n') {
            Some(last_newline) => {
                let rest = self.buffer.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.buffer, rest);

                complete[..last_newline]
                    .split(|b| *b == b'\n')
                    .map(|line| {
                        let line = line.strip_suffix(b"\r").unwrap_or(line);
                        String::from_utf8_lossy(line).into_owned()
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        if self.buffer.len() > self.max_line {
            let pending = self.buffer.len();
            self.buffer.clear();
            return Err(ClientError::FrameTooLarge {
                limit: self.max_line,
                pending,
            });
        }

        Ok(lines)
    }

    /// Whether an unterminated line is pending.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// End of input. Returns the unterminated remainder, if any, which is not a frame.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buffer).into_owned())
        }
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use chatwire::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_line(": keep-alive"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

/// A complete, recognized frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(StreamEvent),
    Done,
}

/// Parse one line into a frame.
///
/// Returns `None` for non-data lines, malformed payloads and unknown event
/// kinds; none of these interrupt the stream.
pub fn parse_frame(line: &str) -> Option<Frame> {
    let data = parse_sse_line(line.trim())?;

    if is_done_marker(data) {
        return Some(Frame::Done);
    }
    if data.is_empty() {
        return None;
    }

    let envelope = match serde_json::from_str::<EventEnvelope>(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "skipping malformed SSE frame");
            return None;
        }
    };

    let kind = envelope.event.clone();
    match envelope.into_event() {
        Ok(Some(event)) => Some(Frame::Event(event)),
        Ok(None) => {
            debug!(kind = %kind, "ignoring unknown stream event");
            None
        }
        Err(e) => {
            warn!(kind = %kind, error = %e, "skipping SSE frame with invalid payload");
            None
        }
    }
}

/// Turn a raw byte stream into stream events.
///
/// Ends at the `[DONE]` marker, at the end of the byte stream, or right after
/// yielding the first transport error.
pub fn sse_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<ClientError> + Send,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        reassembler: Some(FrameReassembler::new()),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = match state.reassembler.as_mut().map(|r| r.push(chunk.as_ref())) {
                        Some(Ok(lines)) => lines,
                        Some(Err(e)) => {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        None => Vec::new(),
                    };
                    for line in lines {
                        match parse_frame(&line) {
                            Some(Frame::Event(event)) => state.pending.push_back(event),
                            Some(Frame::Done) => {
                                state.finished = true;
                                break;
                            }
                            None => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    if let Some(rest) = state.reassembler.take().and_then(FrameReassembler::finish) {
                        debug!(bytes = rest.len(), "discarding unterminated data at end of stream");
                    }
                }
            }
        }
    })
}

struct SseState<S> {
    bytes: std::pin::Pin<Box<S>>,
    reassembler: Option<FrameReassembler>,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

/// Extension trait for `reqwest::Response` to read its body as stream events.
pub trait SSEResponseExt {
    fn sse_events(self) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_events(self) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send {
        sse_events(self.bytes_stream())
    }
}
