//! Error types and Result alias for the live-update client

use thiserror::Error;

/// Main error type for the signage live-update client
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Event stream returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Unexpected content type: {0}")]
    InvalidContentType(String),

    #[error("Event stream closed by server")]
    StreamClosed,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A consumer asked for the shared live connection outside the scope
    /// that provides it.
    #[error("Live connection context is not available")]
    ContextUnavailable,

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),
}

impl Error {
    /// Whether the fault belongs to the connection itself (and should drive
    /// the reconnect loop) rather than to a single frame.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::HttpStatus(_)
                | Error::AuthenticationError(_)
                | Error::InvalidContentType(_)
                | Error::StreamClosed
        )
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
