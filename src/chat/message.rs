//! Transcript messages.

use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person typing queries.
    User,
    /// The streamed answer.
    Bot,
}

/// Visual style of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStyle {
    #[default]
    Normal,
    /// Backend-reported failure, drawn distinctly from normal bot output.
    Error,
}

/// Position of a message in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub usize);

/// A single message in the transcript.
///
/// Messages are never removed. Only the bot message of the open stream
/// session is ever mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    #[serde(default)]
    pub style: MessageStyle,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            style: MessageStyle::Normal,
        }
    }

    /// Create an empty bot message awaiting its first token.
    #[must_use]
    pub fn pending_bot() -> Self {
        Self {
            text: String::new(),
            sender: Sender::Bot,
            style: MessageStyle::Normal,
        }
    }
}
