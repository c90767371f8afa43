//! Stream event protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of a single stream event and envelope injection.
//! It has no dependency on the orchestrator crate; `planner-core` constructs
//! `ProtocolEvent`s and calls `to_json` to stamp them with the session envelope.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
