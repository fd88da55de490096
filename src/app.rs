//! The chat event loop.
//!
//! [`ChatApp`] is the only place transport events, user input and the status
//! timer meet. Everything is applied to the [`ChatClient`] from this one loop,
//! one event at a time.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::chat::{ChatClient, ChatView};
use crate::error::Result;
use crate::transport::{EventReceiver, QueryTransport, event_channel};

/// A [`ChatClient`] together with the receiving end of its event channel.
#[derive(Debug)]
pub struct ChatApp<V, T> {
    client: ChatClient<V, T>,
    events: EventReceiver,
}

impl<V: ChatView, T: QueryTransport> ChatApp<V, T> {
    pub fn new(view: V, transport: T) -> Self {
        let (tx, rx) = event_channel();
        Self {
            client: ChatClient::new(view, transport, tx),
            events: rx,
        }
    }

    #[must_use]
    pub fn with_error_status_duration(mut self, duration: Duration) -> Self {
        self.client = self.client.with_error_status_duration(duration);
        self
    }

    pub fn client(&self) -> &ChatClient<V, T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ChatClient<V, T> {
        &mut self.client
    }

    /// Submit `query` and process its stream until the session closes.
    pub async fn ask(&mut self, query: &str) -> Result<()> {
        if self.client.submit_query(query)?.is_some() {
            self.drain_session().await;
        }
        Ok(())
    }

    /// Interactive loop: every input line is a query.
    ///
    /// Lines arriving while a query streams are rejected. A line that is not
    /// valid UTF-8 is skipped. At end of input the open session, if any, is
    /// allowed to finish.
    pub async fn run<R>(&mut self, input: R) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        self.client.view_mut().focus_input();

        while input_open || self.client.is_busy() {
            let deadline = self.client.status_deadline();
            // Pending stream events are applied before the next input line.
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.client.handle_event(event),
                () = status_expiry(deadline), if deadline.is_some() => {
                    self.client.expire_status(Instant::now());
                }
                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) => self.submit(&line),
                    Ok(None) => input_open = false,
                    // The reader has already consumed the offending line.
                    Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                        warn!(name: "chat.input.invalid", error = %err, "Skipping unreadable input line");
                    }
                    Err(err) => return Err(err),
                },
            }
        }
        Ok(())
    }

    fn submit(&mut self, line: &str) {
        match self.client.submit_query(line) {
            Ok(Some(_)) => {}
            Ok(None) => self.client.view_mut().focus_input(),
            Err(err) => debug!(name: "chat.submit.failed", error = %err, "Query not submitted"),
        }
    }

    async fn drain_session(&mut self) {
        while self.client.is_busy() {
            match self.events.recv().await {
                Some(event) => self.client.handle_event(event),
                None => break,
            }
        }
    }
}

async fn status_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
