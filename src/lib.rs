//! Query Chat
//!
//! A streaming chat client for a Server-Sent-Events query endpoint. Each
//! submitted query opens one stream; the answer is rendered token by token
//! as structured JSON events arrive.
//!
//! # Architecture
//!
//! - **Chat core**: transcript, input-control state and the single open
//!   stream session, rendering through a [`chat::ChatView`]
//! - **Transport**: Server-Sent Events over HTTP, delivered to the core as
//!   ordered [`transport::SessionEvent`]s on one channel
//! - **Front-end**: a line-terminal view and the event loop that drives it
//!
//! # Modules
//!
//! - [`chat`]: chat client state machine and views
//! - [`protocol`]: stream payload format
//! - [`transport`]: stream subscriptions and SSE decoding
//! - [`terminal`]: terminal rendering
//! - [`app`]: event loop
//! - [`config`]: command line and configuration loading

#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod protocol;
pub mod terminal;
pub mod transport;

pub use app::ChatApp;
pub use chat::{ChatClient, ChatView, MemoryView};
pub use error::{ChatError, TransportError};
pub use transport::HttpTransport;
