//! Line-terminal rendering of the chat.
//!
//! A terminal cannot redraw earlier output, so [`TerminalView`] streams the
//! pending bot message: it remembers what it already printed for each message
//! and writes only the new suffix. When a message's text is replaced rather
//! than extended (a backend error), the new text is printed on a fresh line.
//! Status notices go to a second writer, normally stderr.

use std::io::{self, Write};

use tracing::debug;

use crate::chat::{ChatView, Message, MessageId, MessageStyle, Sender, UiStatus};

/// Default "awaiting token" marker.
pub const DEFAULT_CURSOR: &str = "▌";

const PROMPT: &str = "> ";

/// [`ChatView`] for a line terminal.
#[derive(Debug)]
pub struct TerminalView<W, E> {
    out: W,
    status_out: E,
    cursor: String,
    echo_user: bool,
    prompt: bool,
    printed: Vec<String>,
    /// Message whose text ends the current output line.
    open_line: Option<MessageId>,
    /// Label to reprint when a status notice interrupts a streaming bot line.
    resume_label: Option<&'static str>,
    cursor_shown: bool,
    last_status: UiStatus,
}

impl TerminalView<io::Stdout, io::Stderr> {
    /// Render to stdout, status to stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> TerminalView<W, E> {
    pub fn new(out: W, status_out: E) -> Self {
        Self {
            out,
            status_out,
            cursor: DEFAULT_CURSOR.to_string(),
            echo_user: true,
            prompt: true,
            printed: Vec::new(),
            open_line: None,
            resume_label: None,
            cursor_shown: false,
            last_status: UiStatus::Idle,
        }
    }

    /// Use `cursor` as the awaiting-token marker. Empty disables it.
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = cursor.into();
        self
    }

    /// Whether user messages are printed. Interactive sessions turn this off
    /// since the typed line is already on screen.
    #[must_use]
    pub fn with_user_echo(mut self, echo: bool) -> Self {
        self.echo_user = echo;
        self
    }

    /// Whether `focus_input` prints an input prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Consume the view and return its writers.
    pub fn into_inner(self) -> (W, E) {
        (self.out, self.status_out)
    }

    fn write(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()) {
            debug!(name: "terminal.write_failed", error = %err, "Terminal write failed");
        }
    }

    fn erase_cursor(&mut self) {
        if !self.cursor_shown {
            return;
        }
        self.cursor_shown = false;
        let width = self.cursor.chars().count();
        let erase = "\u{8}".repeat(width) + &" ".repeat(width) + &"\u{8}".repeat(width);
        self.write(&erase);
    }

    fn end_line(&mut self) {
        if self.open_line.take().is_some() {
            self.write("\n");
        }
    }

    fn start_line(&mut self, id: MessageId, message: &Message) {
        self.end_line();
        let label = match (message.sender, message.style) {
            (Sender::User, _) => "you: ",
            (Sender::Bot, MessageStyle::Normal) => "bot: ",
            (Sender::Bot, MessageStyle::Error) => "bot (error): ",
        };
        self.write(label);
        self.write(&message.text);
        self.open_line = Some(id);
        self.resume_label = (message.sender == Sender::Bot).then_some(label);
    }

    /// Move a streaming line out of the way of a status notice. Returns the
    /// line to resume and whether its cursor was showing.
    fn suspend_line(&mut self) -> Option<(MessageId, bool)> {
        let had_cursor = self.cursor_shown;
        self.erase_cursor();
        let id = self.open_line?;
        self.end_line();
        self.scroll_to_end();
        self.resume_label.map(|_| (id, had_cursor))
    }

    fn resume_line(&mut self, id: MessageId, cursor: bool) {
        let Some(label) = self.resume_label else {
            return;
        };
        let text = self.printed.get(id.0).cloned().unwrap_or_default();
        self.write(label);
        self.write(&text);
        self.open_line = Some(id);
        if cursor {
            let marker = self.cursor.clone();
            self.write(&marker);
            self.cursor_shown = true;
        }
        self.scroll_to_end();
    }
}

impl<W: Write, E: Write> ChatView for TerminalView<W, E> {
    fn render_message(&mut self, id: MessageId, message: &Message, cursor: bool) {
        self.erase_cursor();

        if message.sender == Sender::User && !self.echo_user {
            self.printed.push(message.text.clone());
            return;
        }

        if id.0 >= self.printed.len() {
            self.start_line(id, message);
            self.printed.push(message.text.clone());
        } else {
            let printed = &self.printed[id.0];
            let extends = self.open_line == Some(id) && message.text.starts_with(printed.as_str());
            let printed_len = printed.len();
            if extends {
                self.write(&message.text[printed_len..]);
            } else {
                self.start_line(id, message);
            }
            self.printed[id.0].clone_from(&message.text);
        }

        if cursor && !self.cursor.is_empty() {
            let marker = self.cursor.clone();
            self.write(&marker);
            self.cursor_shown = true;
        }
    }

    fn set_status(&mut self, status: &UiStatus) {
        if *status == self.last_status {
            return;
        }
        self.last_status = status.clone();
        let line = match status {
            UiStatus::Idle => return,
            UiStatus::AwaitingResponse { text: None } => "[waiting for response]".to_string(),
            UiStatus::AwaitingResponse { text: Some(text) } => format!("[{text}]"),
            UiStatus::Error { text } => format!("[{text}]"),
        };
        let suspended = self.suspend_line();
        let result = writeln!(self.status_out, "{line}").and_then(|()| self.status_out.flush());
        if let Err(err) = result {
            debug!(name: "terminal.write_failed", error = %err, "Status write failed");
        }
        if let Some((id, cursor)) = suspended {
            self.resume_line(id, cursor);
        }
    }

    fn set_submit_enabled(&mut self, _enabled: bool) {}

    fn clear_input(&mut self) {}

    fn focus_input(&mut self) {
        self.end_line();
        if self.prompt {
            self.write(PROMPT);
        }
        self.scroll_to_end();
    }

    fn scroll_to_end(&mut self) {
        if let Err(err) = self.out.flush() {
            debug!(name: "terminal.flush_failed", error = %err, "Terminal flush failed");
        }
    }
}
