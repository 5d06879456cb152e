//! Server-Sent Events (SSE) stream decoding.
//!
//! Turns a chunked response body into a lazy sequence of JSON frames,
//! independent of where the network split the chunks.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Each decode session owns its buffer and the underlying byte stream.
//! Dropping the returned stream, reaching `[DONE]`, or hitting end of input
//! all release the byte stream.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ApiError, ClientError};

const DONE_LINE: &str = "data: [DONE]";

/// Extension trait for `reqwest::Response` to enable SSE streaming.
///
/// # Example
/// ```ignore
/// use usai::sse::SSEResponseExt;
///
/// let response = client.get("https://api.example.com/stream").send().await?;
///
/// let mut stream = response.sse_events::<MyEventType>();
/// while let Some(result) = stream.next().await {
///     let event = result?;
///     println!("Event: {:?}", event);
/// }
/// ```
pub trait SSEResponseExt {
    /// Consume the response body as a stream of decoded `data:` frames.
    ///
    /// Stops when the `[DONE]` marker is encountered or the body ends.
    fn sse_events<T>(self) -> impl Stream<Item = Result<T, ClientError>> + Send
    where
        T: DeserializeOwned + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_events<T>(self) -> impl Stream<Item = Result<T, ClientError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        decode_events(self.bytes_stream())
    }
}

/// Decode a byte stream of SSE lines into frames of type `T`.
///
/// Blank lines and lines without a `data: ` prefix are ignored. Frames that
/// fail to deserialize are logged and skipped. An unterminated final line is
/// discarded. A transport error is yielded once and ends the sequence.
pub fn decode_events<T, S, E>(byte_stream: S) -> impl Stream<Item = Result<T, ClientError>> + Send
where
    T: DeserializeOwned + Send,
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Into<ApiError>,
{
    let session = DecodeSession {
        bytes: Box::pin(byte_stream),
        buffer: BytesMut::new(),
        scanned: 0,
    };

    stream::unfold(Some(session), |state| async move {
        let Some(mut session) = state else {
            return None;
        };

        loop {
            while let Some(line) = session.next_line() {
                if is_done_marker(&line) {
                    debug!("stream finished with [DONE]");
                    return None;
                }

                let Some(data) = parse_sse_line(&line) else {
                    continue;
                };

                match serde_json::from_str::<T>(data) {
                    Ok(event) => return Some((Ok(event), Some(session))),
                    Err(e) => warn!(error = %e, "skipping malformed stream frame: {}", data),
                }
            }

            match session.bytes.next().await {
                Some(Ok(chunk)) => session.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    let err: ApiError = e.into();
                    warn!(kind = %err.kind, "stream interrupted: {}", err.message);
                    return Some((Err(ClientError::Api(err)), None));
                }
                None => {
                    if !session.buffer.is_empty() {
                        debug!(
                            bytes = session.buffer.len(),
                            "discarding unterminated final line"
                        );
                    }
                    return None;
                }
            }
        }
    })
}

struct DecodeSession<S> {
    bytes: Pin<Box<S>>,
    /// Tail of the last incomplete line
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
}

impl<S> DecodeSession<S> {
    fn next_line(&mut self) -> Option<String> {
        let Some(pos) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };

        let line = self.buffer.split_to(self.scanned + pos + 1);
        self.scanned = 0;
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use usai::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.trim().strip_prefix("data: ").map(|s| s.trim())
}

/// Check if an SSE line is the end-of-stream sentinel.
///
/// Only surrounding whitespace is ignored; the line must otherwise read
/// exactly `data: [DONE]`.
///
/// # Example
/// ```
/// use usai::sse::is_done_marker;
///
/// assert!(is_done_marker("data: [DONE]"));
/// assert!(is_done_marker("data: [DONE]\r\n"));
/// assert!(!is_done_marker("data:   [DONE]"));
/// assert!(!is_done_marker("data: {\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(line: &str) -> bool {
    line.trim() == DONE_LINE
}
