//! Server-Sent Events (SSE) processing for streaming chat completions.
//!
//! This module turns the raw byte stream of an HTTP response into
//! [`SseFrame`]s and then into the plain text fragments the conversation
//! session consumes.  Buffering is byte-based so a multi-byte character split
//! across two network reads is reassembled before decoding.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Payload that terminates an OpenAI-compatible stream.
const DONE_MARKER: &str = "[DONE]";

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// A completion chunk.
    Chunk(ChatCompletionChunk),

    /// A comment or an event without data (providers send these as keep-alives).
    KeepAlive,

    /// The `[DONE]` terminator.
    Done,
}

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    finished: bool,
}

/// Process a stream of bytes into a stream of server-sent event frames.
///
/// The returned stream ends after the first error; it never resumes.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<SseFrame>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
        })
    });

    let state = SseState {
        stream,
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            // First check if we have a complete event in the buffer
            if let Some(frame) = extract_frame(&mut state.buffer) {
                if frame.is_err() {
                    STREAM_ERRORS.click();
                    state.finished = true;
                }
                return Some((frame, state));
            }

            // Read more data
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    // End of stream; a final event may lack its blank line.
                    state.finished = true;
                    if state.buffer.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let rest = std::mem::take(&mut state.buffer);
                    let frame = parse_frame(&rest);
                    if frame.is_err() {
                        STREAM_ERRORS.click();
                    }
                    return Some((frame, state));
                }
            }
        }
    })
}

/// Reduce a frame stream to the assistant text it carries.
///
/// Empty deltas and keep-alives are skipped, `[DONE]` ends the stream, and so
/// does the first error (after it has been yielded).
pub fn text_fragments<S>(frames: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = Result<SseFrame>> + 'static,
{
    let frames = Box::pin(frames);
    stream::unfold((frames, false), |(mut frames, done)| async move {
        if done {
            return None;
        }
        loop {
            match frames.next().await? {
                Ok(SseFrame::Chunk(chunk)) => {
                    if let Some(text) = chunk.text() {
                        let text = text.to_string();
                        return Some((Ok(text), (frames, false)));
                    }
                }
                Ok(SseFrame::KeepAlive) => {}
                Ok(SseFrame::Done) => return None,
                Err(e) => return Some((Err(e), (frames, true))),
            }
        }
    })
}

/// Remove and parse the first complete event from `buffer`.
fn extract_frame(buffer: &mut Vec<u8>) -> Option<Result<SseFrame>> {
    let (end, rest) = find_boundary(buffer)?;
    let event: Vec<u8> = buffer.drain(..rest).take(end).collect();
    Some(parse_frame(&event))
}

/// Find the blank line ending the first event.
///
/// Returns the offset where the event text ends and the offset where the next
/// event starts.  Both `\n\n` and `\n\r\n` count as a blank line.
fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    for (i, byte) in buffer.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        match buffer.get(i + 1) {
            Some(b'\n') => return Some((i, i + 2)),
            Some(b'\r') if buffer.get(i + 2) == Some(&b'\n') => return Some((i, i + 3)),
            _ => {}
        }
    }
    None
}

/// Parse a single event's lines.
fn parse_frame(event: &[u8]) -> Result<SseFrame> {
    let text = std::str::from_utf8(event)?;

    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
        // `event:`, `id:` and `retry:` carry nothing a chat client needs.
    }

    if data.is_empty() {
        return Ok(SseFrame::KeepAlive);
    }
    let payload = data.join("\n");
    let payload = payload.trim();
    if payload == DONE_MARKER {
        return Ok(SseFrame::Done);
    }

    let chunk = serde_json::from_str::<ChatCompletionChunk>(payload).map_err(|e| {
        Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        )
    })?;

    if let Some(error) = &chunk.error {
        let message = error
            .message
            .clone()
            .unwrap_or_else(|| "provider reported an error mid-stream".to_string());
        return Err(match error.status_code() {
            Some(401) => Error::authentication(message),
            Some(status) => Error::api(status, error.error_type.clone(), message, None),
            None => Error::streaming(message, None),
        });
    }

    Ok(SseFrame::Chunk(chunk))
}
