//! HTTP transport for the live event stream

mod client;

pub use client::HttpEventTransport;
