//! Wire payloads carried by the query stream.
//!
//! Every Server-Sent Event delivered by the query endpoint carries a JSON
//! object in its `data` field. All fields are optional and a single payload
//! may set several of them at once:
//!
//! - `status`: human-readable progress text for the status indicator
//! - `token`: a fragment of the generated answer
//! - `done`: `true` once the answer is complete
//! - `error`: a human-readable error reported by the backend
//!
//! # Example
//!
//! ```rust
//! use query_chat::protocol::StreamPayload;
//!
//! let payload = StreamPayload::parse(r#"{"status":"thinking","token":"Hi"}"#).unwrap();
//! assert_eq!(payload.status.as_deref(), Some("thinking"));
//! assert_eq!(payload.token.as_deref(), Some("Hi"));
//! assert!(!payload.is_done());
//! ```

use serde::{Deserialize, Serialize};

/// One structured event from the query stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamPayload {
    /// Status text to show while the answer is being produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Answer fragment to append to the pending bot message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Normal completion marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Backend-reported error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamPayload {
    /// Parse the `data` field of one event.
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Whether this payload signals normal completion.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done == Some(true)
    }
}

/// Format a payload as an SSE `data` frame.
///
/// Used by test servers and tools that need to speak the same protocol.
#[must_use]
pub fn sse_frame(payload: &StreamPayload) -> String {
    let json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    format!("data: {json}\n\n")
}
