//! Error types for the chat client.

use thiserror::Error;

/// Failure to open or keep a query stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request could not be sent or the connection dropped.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status.
    #[error("Endpoint returned status {0}")]
    Status(u16),

    /// Endpoint answered with something other than an event stream.
    #[error("Unexpected content type: {0}")]
    ContentType(String),

    /// No async runtime to read the stream on.
    #[error("No async runtime: {0}")]
    Runtime(String),

    /// Stream ended without a completion signal.
    #[error("Stream ended unexpectedly")]
    StreamEnded,
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Errors returned by [`crate::chat::ChatClient`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// A query is still streaming; only one session may be open at a time.
    #[error("A query is already in progress")]
    SessionInProgress,

    /// The stream could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
