//! Server-Sent Events framing
//!
//! Wire parsing is delegated to `eventsource-stream`; this module adapts its
//! events into [`SseFrame`]s and maps its errors onto the crate error type.

use crate::transport::FrameStream;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use signage_core::Error;
use std::fmt::Display;

/// Name given to frames without an `event:` field
pub const DEFAULT_EVENT: &str = "message";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// A complete frame from the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Frame name (`event:` field), `message` when absent
    pub event: String,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream, if any
    pub id: Option<String>,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl From<Event> for SseFrame {
    fn from(event: Event) -> Self {
        Self {
            event: if event.event.is_empty() {
                DEFAULT_EVENT.to_string()
            } else {
                event.event
            },
            data: event.data,
            id: (!event.id.is_empty()).then_some(event.id),
        }
    }
}

/// Decode a `text/event-stream` body into frames.
///
/// Body errors become `Transport` faults; malformed input becomes
/// `InvalidFrame`.
pub fn decode_event_stream<S, B, E>(body: S) -> FrameStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    strip_bom(body)
        .eventsource()
        .map(|item| match item {
            Ok(event) => Ok(SseFrame::from(event)),
            Err(EventStreamError::Transport(e)) => Err(Error::Transport(e.to_string())),
            Err(e) => Err(Error::InvalidFrame(e.to_string())),
        })
        .boxed()
}

/// Drop a UTF-8 byte order mark at the very start of the body
fn strip_bom<S, B, E>(body: S) -> impl Stream<Item = std::result::Result<Vec<u8>, E>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut at_start = true;
    body.map(move |chunk| {
        chunk.map(|chunk| {
            let bytes = chunk.as_ref();
            if at_start && !bytes.is_empty() {
                at_start = false;
                return bytes.strip_prefix(BOM).unwrap_or(bytes).to_vec();
            }
            bytes.to_vec()
        })
    })
}
