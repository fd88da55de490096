//! The chat client state machine.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{ChatView, Message, MessageId, MessageStyle, UiStatus};
use crate::error::{ChatError, Result, TransportError};
use crate::protocol::StreamPayload;
use crate::transport::{
    EventSender, QueryTransport, SessionEvent, SessionId, StreamSignal, StreamSubscription,
};

/// How long the connection error notice stays visible.
pub const DEFAULT_ERROR_STATUS_DURATION: Duration = Duration::from_secs(3);

/// Status text shown after a transport failure.
pub const CONNECTION_ERROR_TEXT: &str = "Connection error";

/// One open subscription for one submitted query.
///
/// Owns the text received so far for its bot message.
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    subscription: Box<dyn StreamSubscription>,
    message_id: MessageId,
    response: String,
    closed: bool,
}

impl StreamSession {
    fn new(id: SessionId, subscription: Box<dyn StreamSubscription>, message_id: MessageId) -> Self {
        Self {
            id,
            subscription,
            message_id,
            response: String::new(),
            closed: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The pending bot message this session writes into.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Answer text accumulated so far.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the underlying subscription. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.subscription.close();
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Chat client: transcript, input controls and at most one stream session.
#[derive(Debug)]
pub struct ChatClient<V, T> {
    view: V,
    transport: T,
    events: EventSender,
    messages: Vec<Message>,
    session: Option<StreamSession>,
    status: UiStatus,
    status_deadline: Option<Instant>,
    error_status_duration: Duration,
}

impl<V: ChatView, T: QueryTransport> ChatClient<V, T> {
    /// Create a client. Transport events must be fed back through
    /// [`ChatClient::handle_event`] by whoever owns the receiving half of
    /// `events`.
    pub fn new(view: V, transport: T, events: EventSender) -> Self {
        Self {
            view,
            transport,
            events,
            messages: Vec::new(),
            session: None,
            status: UiStatus::Idle,
            status_deadline: None,
            error_status_duration: DEFAULT_ERROR_STATUS_DURATION,
        }
    }

    /// Override how long the connection error notice stays up.
    #[must_use]
    pub fn with_error_status_duration(mut self, duration: Duration) -> Self {
        self.error_status_duration = duration;
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// All messages in submission order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn status(&self) -> &UiStatus {
        &self.status
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    /// Whether a query is streaming. The submit control is disabled exactly
    /// while this is true.
    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    /// When the current status notice should be hidden, if scheduled.
    pub fn status_deadline(&self) -> Option<Instant> {
        self.status_deadline
    }

    /// Submit a query.
    ///
    /// Returns `Ok(None)` when `text` is blank, and
    /// [`ChatError::SessionInProgress`] while another query is streaming.
    pub fn submit_query(&mut self, text: &str) -> Result<Option<SessionId>> {
        let query = text.trim();
        if query.is_empty() {
            return Ok(None);
        }
        if let Some(session) = &self.session {
            warn!(
                name: "chat.submit.rejected",
                session = %session.id(),
                "Query submitted while another is streaming"
            );
            return Err(ChatError::SessionInProgress);
        }

        self.append(Message::user(query), false);
        self.view.clear_input();
        self.view.set_submit_enabled(false);
        self.status_deadline = None;
        self.set_status(UiStatus::AwaitingResponse { text: None });

        let message_id = self.append(Message::pending_bot(), true);
        let id = SessionId::new();

        match self.transport.open(query, id, self.events.clone()) {
            Ok(subscription) => {
                info!(
                    name: "chat.session.opened",
                    session = %id,
                    query_len = query.len(),
                    "Query stream opened"
                );
                self.session = Some(StreamSession::new(id, subscription, message_id));
                Ok(Some(id))
            }
            Err(err) => {
                error!(name: "chat.session.open_failed", error = %err, "Failed to open query stream");
                self.show_connection_error(message_id);
                Err(err.into())
            }
        }
    }

    /// Apply one event from the transport.
    ///
    /// Events for any session other than the open one are dropped.
    pub fn handle_event(&mut self, event: SessionEvent) {
        let Some(session) = &self.session else {
            debug!(name: "chat.event.stale", session = %event.session, "Event for closed session dropped");
            return;
        };
        if session.id() != event.session {
            debug!(name: "chat.event.stale", session = %event.session, "Event for closed session dropped");
            return;
        }

        match event.signal {
            StreamSignal::Message(data) => self.apply_data(&data),
            StreamSignal::TransportError(err) => self.on_transport_error(&err),
        }
    }

    /// Hide the connection error notice once its deadline has passed.
    pub fn expire_status(&mut self, now: Instant) {
        match self.status_deadline {
            Some(deadline) if deadline <= now => {
                self.status_deadline = None;
                self.set_status(UiStatus::Idle);
            }
            _ => {}
        }
    }

    fn apply_data(&mut self, data: &str) {
        match StreamPayload::parse(data) {
            Ok(payload) => self.apply_payload(payload),
            Err(err) => {
                warn!(
                    name: "chat.payload.malformed",
                    error = %err,
                    data = %data,
                    "Ignoring unparseable stream payload"
                );
            }
        }
    }

    fn apply_payload(&mut self, payload: StreamPayload) {
        let Some(message_id) = self.session.as_ref().map(StreamSession::message_id) else {
            return;
        };
        let done = payload.is_done();

        if let Some(status) = payload.status {
            self.set_status(UiStatus::AwaitingResponse { text: Some(status) });
        }
        if let Some(token) = payload.token {
            self.append_token(&token);
        }
        if done {
            self.complete();
        }
        if let Some(err) = payload.error {
            self.show_backend_error(message_id, &err);
        }
    }

    fn append_token(&mut self, token: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.response.push_str(token);
        let id = session.message_id;
        self.messages[id.0].text.clone_from(&session.response);
        self.render(id, true);
    }

    fn show_backend_error(&mut self, id: MessageId, err: &str) {
        warn!(name: "chat.backend.error", error = %err, "Backend reported an error");
        let text = format!("Error: {err}");
        if let Some(session) = self.session.as_mut() {
            session.response.clone_from(&text);
        }
        let message = &mut self.messages[id.0];
        message.text = text;
        message.style = MessageStyle::Error;
        let cursor = self.session.is_some();
        self.render(id, cursor);
    }

    fn complete(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.close();
        info!(
            name: "chat.session.completed",
            session = %session.id(),
            response_len = session.response().len(),
            "Query stream completed"
        );
        self.render(session.message_id(), false);
        self.set_status(UiStatus::Idle);
        self.view.set_submit_enabled(true);
        self.view.focus_input();
    }

    fn on_transport_error(&mut self, err: &TransportError) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.close();
        error!(
            name: "chat.session.failed",
            session = %session.id(),
            error = %err,
            "Query stream failed"
        );
        self.show_connection_error(session.message_id());
    }

    fn show_connection_error(&mut self, id: MessageId) {
        self.render(id, false);
        self.set_status(UiStatus::Error {
            text: CONNECTION_ERROR_TEXT.to_string(),
        });
        self.status_deadline = Some(Instant::now() + self.error_status_duration);
        self.view.set_submit_enabled(true);
        self.view.focus_input();
    }

    fn append(&mut self, message: Message, cursor: bool) -> MessageId {
        let id = MessageId(self.messages.len());
        self.messages.push(message);
        self.render(id, cursor);
        id
    }

    fn render(&mut self, id: MessageId, cursor: bool) {
        self.view.render_message(id, &self.messages[id.0], cursor);
        self.view.scroll_to_end();
    }

    fn set_status(&mut self, status: UiStatus) {
        self.view.set_status(&status);
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::chat::{MemoryView, Sender};
    use crate::transport::{EventReceiver, event_channel};

    #[derive(Debug, Default)]
    struct FakeState {
        opened: Vec<(String, SessionId)>,
        closes: usize,
        fail_open: bool,
    }

    #[derive(Debug, Clone, Default)]
    struct FakeTransport {
        state: Arc<Mutex<FakeState>>,
    }

    #[derive(Debug)]
    struct FakeSubscription {
        state: Arc<Mutex<FakeState>>,
    }

    impl StreamSubscription for FakeSubscription {
        fn close(&mut self) {
            self.state.lock().unwrap().closes += 1;
        }
    }

    impl QueryTransport for FakeTransport {
        fn open(
            &self,
            query: &str,
            session: SessionId,
            _events: EventSender,
        ) -> std::result::Result<Box<dyn StreamSubscription>, TransportError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_open {
                return Err(TransportError::InvalidUrl("bad".into()));
            }
            state.opened.push((query.to_string(), session));
            Ok(Box::new(FakeSubscription {
                state: Arc::clone(&self.state),
            }))
        }
    }

    fn client() -> (ChatClient<MemoryView, FakeTransport>, FakeTransport, EventReceiver) {
        let (tx, rx) = event_channel();
        let transport = FakeTransport::default();
        let client = ChatClient::new(MemoryView::default(), transport.clone(), tx);
        (client, transport, rx)
    }

    fn send(client: &mut ChatClient<MemoryView, FakeTransport>, id: SessionId, data: &str) {
        client.handle_event(SessionEvent::message(id, data));
    }

    #[test]
    fn test_blank_query_is_noop() {
        let (mut client, transport, _rx) = client();

        assert_eq!(client.submit_query("").unwrap(), None);
        assert_eq!(client.submit_query("   \n\t").unwrap(), None);

        assert!(client.messages().is_empty());
        assert!(client.view().messages.is_empty());
        assert!(client.view().submit_enabled);
        assert!(!client.is_busy());
        assert!(transport.state.lock().unwrap().opened.is_empty());
    }

    #[test]
    fn test_submit_creates_user_and_pending_bot_message() {
        let (mut client, transport, _rx) = client();

        let id = client.submit_query("  hello ").unwrap().unwrap();

        let view = client.view();
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].message, Message::user("hello"));
        assert!(!view.messages[0].cursor);
        assert_eq!(view.messages[1].message.sender, Sender::Bot);
        assert_eq!(view.messages[1].message.text, "");
        assert!(view.messages[1].cursor);
        assert!(!view.submit_enabled);
        assert_eq!(view.input_clears, 1);
        assert_eq!(view.status, UiStatus::AwaitingResponse { text: None });

        let state = transport.state.lock().unwrap();
        assert_eq!(state.opened, vec![("hello".to_string(), id)]);
        assert_eq!(client.session().unwrap().message_id(), MessageId(1));
    }

    #[test]
    fn test_second_submit_rejected_while_streaming() {
        let (mut client, transport, _rx) = client();
        client.submit_query("first").unwrap();

        let err = client.submit_query("second").unwrap_err();
        assert_eq!(err, ChatError::SessionInProgress);
        assert_eq!(client.messages().len(), 2);
        assert_eq!(transport.state.lock().unwrap().opened.len(), 1);
    }

    #[test]
    fn test_status_token_done_sequence() {
        let (mut client, transport, _rx) = client();
        let id = client.submit_query("hello").unwrap().unwrap();

        send(&mut client, id, r#"{"status":"thinking"}"#);
        assert_eq!(client.view().status.text(), Some("thinking"));
        assert_eq!(client.view().last_text(), Some(""));

        send(&mut client, id, r#"{"token":"hi"}"#);
        assert_eq!(client.view().status.text(), Some("thinking"));
        assert_eq!(client.view().last_text(), Some("hi"));
        assert!(client.view().messages[1].cursor);

        send(&mut client, id, r#"{"done":true}"#);
        let view = client.view();
        assert!(!view.status.is_visible());
        assert!(view.submit_enabled);
        assert!(!view.has_cursor());
        assert_eq!(view.focus_count, 1);
        assert!(!client.is_busy());
        assert_eq!(transport.state.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_tokens_accumulate_in_order() {
        let (mut client, _transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();

        send(&mut client, id, r#"{"token":"foo"}"#);
        send(&mut client, id, r#"{"token":"bar"}"#);
        assert_eq!(client.session().unwrap().response(), "foobar");

        send(&mut client, id, r#"{"done":true}"#);
        assert_eq!(client.messages()[1].text, "foobar");
        assert!(!client.view().has_cursor());
    }

    #[test]
    fn test_done_false_keeps_session_open() {
        let (mut client, _transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();

        send(&mut client, id, r#"{"done":false,"token":"x"}"#);
        assert!(client.is_busy());
        assert!(!client.view().submit_enabled);
    }

    #[test]
    fn test_backend_error_keeps_session_open() {
        let (mut client, transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();

        send(&mut client, id, r#"{"error":"backend down"}"#);

        let bot = &client.view().messages[1];
        assert_eq!(bot.message.text, "Error: backend down");
        assert_eq!(bot.message.style, MessageStyle::Error);
        assert!(client.is_busy());
        assert!(!client.view().submit_enabled);
        assert_eq!(transport.state.lock().unwrap().closes, 0);

        send(&mut client, id, r#"{"done":true}"#);
        assert!(client.view().submit_enabled);
        assert_eq!(client.messages()[1].style, MessageStyle::Error);
    }

    #[test]
    fn test_fields_apply_in_order_within_one_event() {
        let (mut client, _transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();

        send(&mut client, id, r#"{"status":"writing","token":"all","done":true}"#);

        assert_eq!(client.messages()[1].text, "all");
        assert_eq!(client.view().status, UiStatus::Idle);
        assert!(!client.is_busy());

        let (mut client, _transport, _rx) = self::client();
        let id = client.submit_query("q").unwrap().unwrap();
        send(&mut client, id, r#"{"done":true,"error":"late"}"#);
        assert_eq!(client.messages()[1].text, "Error: late");
        assert!(!client.view().has_cursor());
    }

    #[test]
    fn test_malformed_payload_is_ignored() {
        let (mut client, transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();
        send(&mut client, id, r#"{"token":"ok"}"#);
        let before = client.view().clone();

        send(&mut client, id, "not json at all");
        send(&mut client, id, r#"{"token":"#);

        assert_eq!(client.view().messages, before.messages);
        assert_eq!(client.view().status, before.status);
        assert!(client.is_busy());
        assert_eq!(transport.state.lock().unwrap().closes, 0);
    }

    #[test]
    fn test_transport_error_restores_input_once() {
        let (mut client, transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();
        send(&mut client, id, r#"{"token":"partial"}"#);

        client.handle_event(SessionEvent::transport_error(id, TransportError::StreamEnded));
        client.handle_event(SessionEvent::transport_error(id, TransportError::StreamEnded));

        let view = client.view();
        assert!(!view.has_cursor());
        assert_eq!(view.last_text(), Some("partial"));
        assert_eq!(view.status.text(), Some(CONNECTION_ERROR_TEXT));
        assert!(view.submit_enabled);
        assert_eq!(view.focus_count, 1);
        assert!(!client.is_busy());
        assert_eq!(transport.state.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_session_close_is_idempotent() {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let mut session = StreamSession::new(
            SessionId::new(),
            Box::new(FakeSubscription {
                state: Arc::clone(&state),
            }),
            MessageId(1),
        );

        session.close();
        session.close();
        assert!(session.is_closed());
        drop(session);
        assert_eq!(state.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_events_from_other_sessions_dropped() {
        let (mut client, _transport, _rx) = client();
        let first = client.submit_query("one").unwrap().unwrap();
        send(&mut client, first, r#"{"done":true}"#);

        let second = client.submit_query("two").unwrap().unwrap();
        send(&mut client, first, r#"{"token":"stale"}"#);
        client.handle_event(SessionEvent::transport_error(first, TransportError::StreamEnded));

        assert!(client.is_busy());
        assert_eq!(client.messages()[3].text, "");

        send(&mut client, second, r#"{"token":"fresh"}"#);
        assert_eq!(client.messages()[3].text, "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_error_status_expires() {
        let (mut client, _transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();
        client.handle_event(SessionEvent::transport_error(id, TransportError::Status(502)));

        let deadline = client.status_deadline().unwrap();
        client.expire_status(Instant::now());
        assert!(client.view().status.is_visible());

        tokio::time::advance(DEFAULT_ERROR_STATUS_DURATION).await;
        client.expire_status(Instant::now());
        assert!(Instant::now() >= deadline);
        assert_eq!(client.view().status, UiStatus::Idle);
        assert!(client.status_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submit_cancels_pending_expiry() {
        let (mut client, _transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();
        client.handle_event(SessionEvent::transport_error(id, TransportError::StreamEnded));

        client.submit_query("again").unwrap();
        assert!(client.status_deadline().is_none());

        tokio::time::advance(DEFAULT_ERROR_STATUS_DURATION * 2).await;
        client.expire_status(Instant::now());
        assert_eq!(client.view().status, UiStatus::AwaitingResponse { text: None });
    }

    #[test]
    fn test_open_failure_restores_input() {
        let (mut client, transport, _rx) = client();
        transport.state.lock().unwrap().fail_open = true;

        let err = client.submit_query("q").unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert!(!client.is_busy());
        assert!(client.view().submit_enabled);
        assert!(!client.view().has_cursor());
        assert_eq!(client.view().status.text(), Some(CONNECTION_ERROR_TEXT));
    }

    #[test]
    fn test_every_mutation_scrolls() {
        let (mut client, _transport, _rx) = client();
        let id = client.submit_query("q").unwrap().unwrap();
        assert_eq!(client.view().scroll_count, 2);

        send(&mut client, id, r#"{"token":"a"}"#);
        assert_eq!(client.view().scroll_count, 3);

        send(&mut client, id, r#"{"done":true}"#);
        assert_eq!(client.view().scroll_count, 4);
    }
}
