//! Server-Sent Events over HTTP.
//!
//! Each subscription is a `GET {base_url}{query_path}?query=...` request read
//! by a spawned task. The task forwards every dispatched `message` event and
//! reports the end of the stream, whatever its cause, as a transport error.
//! There is no reconnection.

use std::io;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::sse::SseDecoder;
use super::{EventSender, QueryTransport, SessionEvent, SessionId, StreamSubscription};
use crate::error::TransportError;

const EVENT_STREAM: &str = "text/event-stream";

/// Opens query streams against an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for `base_url` joined with `query_path`
    /// (e.g. `http://localhost:8000` and `/api/query`).
    pub fn new(base_url: impl AsRef<str>, query_path: &str) -> Result<Self, TransportError> {
        Self::with_client(base_url, query_path, reqwest::Client::new())
    }

    /// Create a transport whose requests give up connecting after `timeout`.
    pub fn with_connect_timeout(
        base_url: impl AsRef<str>,
        query_path: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Self::with_client(base_url, query_path, http)
    }

    /// Create a transport with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        query_path: &str,
        http: reqwest::Client,
    ) -> Result<Self, TransportError> {
        let endpoint = Url::parse(base_url.as_ref())?.join(query_path)?;
        Ok(Self { endpoint, http })
    }

    /// The endpoint URL without query parameters.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL for `query`.
    #[must_use]
    pub fn query_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("query", query);
        url
    }
}

impl QueryTransport for HttpTransport {
    /// Spawns the reader task on the current tokio runtime. Fails with
    /// [`TransportError::Runtime`] when called outside one.
    fn open(
        &self,
        query: &str,
        session: SessionId,
        events: EventSender,
    ) -> Result<Box<dyn StreamSubscription>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| TransportError::Runtime(err.to_string()))?;
        let url = self.query_url(query);
        let cancel = CancellationToken::new();
        let request = self.http.get(url.clone()).header(ACCEPT, EVENT_STREAM);

        debug!(name: "transport.http.open", session = %session, url = %url, "Opening query stream");

        let token = cancel.clone();
        runtime.spawn(async move {
            let outcome = tokio::select! {
                () = token.cancelled() => return,
                outcome = read_stream(request, session, &events) => outcome,
            };
            if token.is_cancelled() {
                return;
            }
            let err = outcome.err().unwrap_or(TransportError::StreamEnded);
            // Receiver gone means the chat loop has shut down.
            let _ = events.send(SessionEvent::transport_error(session, err));
        });

        Ok(Box::new(HttpSubscription { cancel }))
    }
}

/// Read the response body until it ends.
///
/// `Ok(())` means the server closed the stream; the caller still reports that
/// as a transport error, since the protocol signals completion in-band.
async fn read_stream(
    request: reqwest::RequestBuilder,
    session: SessionId,
    events: &EventSender,
) -> Result<(), TransportError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with(EVENT_STREAM) {
        return Err(TransportError::ContentType(content_type));
    }

    info!(name: "transport.http.connected", session = %session, "Query stream connected");

    let body = response.bytes_stream().map_err(io::Error::other);
    let frames = FramedRead::new(StreamReader::new(body), SseDecoder::new());
    futures::pin_mut!(frames);

    while let Some(event) = frames.next().await {
        let event = event.map_err(|err| TransportError::Http(err.to_string()))?;
        if !event.is_message() {
            debug!(
                name: "transport.http.event_skipped",
                session = %session,
                event = event.event.as_deref().unwrap_or_default(),
                "Ignoring named event"
            );
            continue;
        }
        if events.send(SessionEvent::message(session, event.data)).is_err() {
            warn!(name: "transport.http.receiver_closed", session = %session, "Chat loop gone");
            return Ok(());
        }
    }
    Ok(())
}

/// Handle returned by [`HttpTransport::open`].
#[derive(Debug)]
struct HttpSubscription {
    cancel: CancellationToken,
}

impl StreamSubscription for HttpSubscription {
    fn close(&mut self) {
        self.cancel.cancel();
    }
}
