//! Transport seam between the connection manager and the wire

use crate::sse::SseFrame;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use signage_core::Result;

/// Frames of one open connection. Ends when the server closes the stream;
/// an `Err` item that is a transport fault ends the connection as well.
pub type FrameStream = BoxStream<'static, Result<SseFrame>>;

/// Opens push-stream connections.
///
/// The connection manager calls [`open`](EventTransport::open) once per
/// connection attempt and drops the returned stream to close it.
pub trait EventTransport: Send + Sync + 'static {
    /// Open a new stream, resuming after `last_event_id` when the server
    /// supports it.
    fn open(&self, last_event_id: Option<String>) -> BoxFuture<'static, Result<FrameStream>>;
}
