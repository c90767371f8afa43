//! Envelope (session_id, timestamp) applied to every event on the wire (§3, §6).
//! `EnvelopeState` is one per turn/session and stamps each event as it is emitted.

use crate::event::ProtocolEvent;
use serde_json::Value;

/// Envelope fields every streamed event carries (§3 StreamEvent, §6 SSE wire format).
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Session ID; constant within a session.
    pub session_id: Option<String>,
    /// Event timestamp, seconds since the Unix epoch.
    pub timestamp: Option<f64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, ts: f64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ts) = self.timestamp {
            obj.entry("timestamp").or_insert_with(|| {
                serde_json::Number::from_f64(ts)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            });
        }
    }
}

/// Envelope state for one turn: session_id plus a caller-supplied clock.
///
/// The clock is injected (rather than read from `SystemTime::now()` directly)
/// so tests can stamp events deterministically.
pub struct EnvelopeState {
    pub session_id: String,
    clock: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl EnvelopeState {
    pub fn new(session_id: String) -> Self {
        Self::with_clock(session_id, || {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0)
        })
    }

    pub fn with_clock(session_id: String, clock: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            session_id,
            clock: Box::new(clock),
        }
    }

    /// Injects envelope into the event value using the current clock reading.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_timestamp((self.clock)());
        env.inject_into(value);
    }
}

/// Converts a protocol event to JSON and injects envelope using the given state.
/// Returns the final value (type + payload + session_id + timestamp).
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProtocolEvent;

    #[test]
    fn envelope_inject() {
        let mut obj = serde_json::json!({"type":"conversation_start"});
        let env = Envelope::new()
            .with_session_id("sess-1")
            .with_timestamp(42.0);
        env.inject_into(&mut obj);
        assert_eq!(obj["session_id"], "sess-1");
        assert_eq!(obj["timestamp"], 42.0);
        assert_eq!(obj["type"], "conversation_start");
    }

    #[test]
    fn to_json_injects_envelope() {
        let ev = ProtocolEvent::ConversationStart;
        let mut state = EnvelopeState::with_clock("run-123".to_string(), || 7.5);
        let value = to_json(&ev, &mut state).unwrap();
        assert_eq!(value["type"], "conversation_start");
        assert_eq!(value["session_id"], "run-123");
        assert_eq!(value["timestamp"], 7.5);
    }

    #[test]
    fn inject_into_does_not_overwrite_existing_keys() {
        let mut obj = serde_json::json!({"type":"heartbeat","session_id":"fixed"});
        let mut state = EnvelopeState::with_clock("run-999".to_string(), || 1.0);
        state.inject_into(&mut obj);
        assert_eq!(obj["session_id"], "fixed");
    }
}
