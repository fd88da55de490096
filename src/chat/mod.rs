//! Chat client core.
//!
//! The chat core owns the transcript, at most one open stream session and the
//! presentation state of the input controls. It never draws anything itself:
//! every visible change goes through a [`ChatView`], so the same core drives a
//! terminal, a headless recorder or any other surface.
//!
//! # Architecture
//!
//! - [`ChatClient`]: submits queries and applies stream events
//! - [`StreamSession`]: the handle to one open query stream
//! - [`ChatView`]: the rendering surface
//! - [`MemoryView`]: a headless view that records what it was told to show
//!
//! # Example
//!
//! ```rust,no_run
//! use query_chat::chat::{ChatClient, MemoryView};
//! use query_chat::transport::{HttpTransport, event_channel};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, mut rx) = event_channel();
//! let transport = HttpTransport::new("http://127.0.0.1:8000", "/api/query")?;
//! let mut client = ChatClient::new(MemoryView::default(), transport, tx);
//! client.submit_query("What is RRF?")?;
//! while client.is_busy() {
//!     let Some(event) = rx.recv().await else { break };
//!     client.handle_event(event);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod message;
mod status;
mod view;

pub use client::{ChatClient, StreamSession, CONNECTION_ERROR_TEXT, DEFAULT_ERROR_STATUS_DURATION};
pub use message::{Message, MessageId, MessageStyle, Sender};
pub use status::UiStatus;
pub use view::{ChatView, MemoryView, RenderedMessage};
