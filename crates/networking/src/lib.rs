//! Signage Networking - SSE wire decoding and the HTTP event-stream transport

pub mod http;
pub mod sse;
pub mod transport;

pub use http::HttpEventTransport;
pub use sse::{decode_event_stream, SseFrame};
pub use transport::{EventTransport, FrameStream};
