//! Rendering surface for the chat core.

use super::{Message, MessageId, UiStatus};

/// Everything the chat core needs from a display.
///
/// Calls arrive in the order the core mutates its state. `render_message` is
/// called with a fresh id when a message is appended and with an existing id
/// when the pending bot message changes; implementations redraw the whole
/// message each time.
pub trait ChatView {
    /// Draw (or redraw) a message. `cursor` asks for the "awaiting token"
    /// marker after the text.
    fn render_message(&mut self, id: MessageId, message: &Message, cursor: bool);

    /// Update the status indicator.
    fn set_status(&mut self, status: &UiStatus);

    /// Enable or disable the submit control.
    fn set_submit_enabled(&mut self, enabled: bool);

    /// Empty the input field.
    fn clear_input(&mut self);

    /// Return focus to the input field.
    fn focus_input(&mut self);

    /// Bring the latest content into view.
    fn scroll_to_end(&mut self);
}

/// A message as last drawn by a [`MemoryView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub message: Message,
    pub cursor: bool,
}

/// Headless view that keeps the last drawn state in memory.
#[derive(Debug, Clone)]
pub struct MemoryView {
    pub messages: Vec<RenderedMessage>,
    pub status: UiStatus,
    pub submit_enabled: bool,
    pub input_clears: usize,
    pub focus_count: usize,
    pub scroll_count: usize,
}

impl Default for MemoryView {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            status: UiStatus::Idle,
            submit_enabled: true,
            input_clears: 0,
            focus_count: 0,
            scroll_count: 0,
        }
    }
}

impl MemoryView {
    /// Text of the last message, if any.
    #[must_use]
    pub fn last_text(&self) -> Option<&str> {
        self.messages.last().map(|m| m.message.text.as_str())
    }

    /// Whether any message still shows the cursor marker.
    #[must_use]
    pub fn has_cursor(&self) -> bool {
        self.messages.iter().any(|m| m.cursor)
    }
}

impl ChatView for MemoryView {
    fn render_message(&mut self, id: MessageId, message: &Message, cursor: bool) {
        let rendered = RenderedMessage {
            message: message.clone(),
            cursor,
        };
        match self.messages.get_mut(id.0) {
            Some(slot) => *slot = rendered,
            None => self.messages.push(rendered),
        }
    }

    fn set_status(&mut self, status: &UiStatus) {
        self.status = status.clone();
    }

    fn set_submit_enabled(&mut self, enabled: bool) {
        self.submit_enabled = enabled;
    }

    fn clear_input(&mut self) {
        self.input_clears += 1;
    }

    fn focus_input(&mut self) {
        self.focus_count += 1;
    }

    fn scroll_to_end(&mut self) {
        self.scroll_count += 1;
    }
}
