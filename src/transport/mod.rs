//! Query stream transport.
//!
//! A transport opens one subscription per submitted query and reports what
//! happens on it as [`SessionEvent`]s over a single channel. The chat core
//! consumes that channel on its own loop, so every event of a session is
//! applied in the order the endpoint sent it and nothing mutates the
//! transcript concurrently.
//!
//! # Implementations
//!
//! - [`HttpTransport`]: Server-Sent Events over HTTP (`reqwest`)

pub mod http;
pub mod sse;

pub use http::HttpTransport;
pub use sse::{SseDecoder, SseEvent};

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;

/// Identifier of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Something that happened on an open stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// The `data` of one dispatched message event.
    Message(String),
    /// The connection failed or closed. Terminal for the session.
    TransportError(TransportError),
}

/// A [`StreamSignal`] tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub signal: StreamSignal,
}

impl SessionEvent {
    /// A message event carrying `data`.
    pub fn message(session: SessionId, data: impl Into<String>) -> Self {
        Self {
            session,
            signal: StreamSignal::Message(data.into()),
        }
    }

    /// A transport failure.
    #[must_use]
    pub fn transport_error(session: SessionId, err: TransportError) -> Self {
        Self {
            session,
            signal: StreamSignal::TransportError(err),
        }
    }
}

/// Sending half of the session event channel.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
/// Receiving half of the session event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create the channel shared by a transport and the chat loop.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Handle to an open subscription.
pub trait StreamSubscription: fmt::Debug + Send {
    /// Stop delivering events. Calling it again has no effect.
    fn close(&mut self);
}

/// Opens query streams.
pub trait QueryTransport {
    /// Subscribe to the answer stream for `query`.
    ///
    /// Events are sent on `events`, tagged with `session`, until the stream
    /// fails or the returned subscription is closed.
    fn open(
        &self,
        query: &str,
        session: SessionId,
        events: EventSender,
    ) -> Result<Box<dyn StreamSubscription>, TransportError>;
}
