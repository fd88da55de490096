//! Status indicator state.

/// What the status indicator shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UiStatus {
    /// Hidden.
    #[default]
    Idle,
    /// A query is in flight. `text` carries the latest backend status, if any.
    AwaitingResponse { text: Option<String> },
    /// Transient connection failure notice.
    Error { text: String },
}

impl UiStatus {
    /// Whether the indicator is shown at all.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Text to display, if the status carries any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Idle | Self::AwaitingResponse { text: None } => None,
            Self::AwaitingResponse { text: Some(text) } | Self::Error { text } => Some(text.as_str()),
        }
    }
}
