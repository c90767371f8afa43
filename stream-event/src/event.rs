//! Protocol-level event types: wire shape of one streamed agent event.
//!
//! `ProtocolEvent` is the tagged union of everything the planning agent can push
//! to a sink (terminal, SSE). Envelope fields (session_id, timestamp) are applied
//! separately by [`crate::envelope`] so event construction stays independent of
//! session bookkeeping.

use serde::Serialize;
use serde_json::Value;

/// One event in the agent's output stream.
///
/// Matches the core's StreamEvent kinds: conversation lifecycle, assistant token
/// streaming, tool-call lifecycle, processing status, errors, and document
/// artifacts (generated designs, prefab info, edit proposals). `Heartbeat` is
/// synthesized by sinks (e.g. the SSE handler) rather than by the orchestrator.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    ConversationStart,
    ConversationEnd,
    AssistantMessageStart,
    AssistantMessageChunk { content: String },
    AssistantMessageEnd { content: String, tool_call_count: usize },
    ToolCallStart { call_id: String, name: String, arguments: Value },
    ToolCallProgress { call_id: String, summary: String },
    ToolCallEnd { call_id: String, name: String, success: bool, duration_ms: u64 },
    ProcessingStatus { stage: String, detail: Option<String> },
    Error { kind: String, message: String, recoverable: bool },
    DesignDocumentGenerated { filename: String, content: String },
    PrefabsInfo { content: String },
    DocumentEditProposal {
        proposal_id: String,
        document_type: String,
        document_filename: String,
        edits: Vec<EditEntry>,
        summary: String,
        preview_content: Option<String>,
    },
    Heartbeat,
}

/// One proposed search/replace edit within a `DocumentEditProposal` event.
#[derive(Clone, Debug, Serialize)]
pub struct EditEntry {
    pub search: String,
    pub replace: String,
    pub reason: String,
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// The SSE `event:` name for this variant (snake_case tag, same as `type`).
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProtocolEvent::ConversationStart => "conversation_start",
            ProtocolEvent::ConversationEnd => "conversation_end",
            ProtocolEvent::AssistantMessageStart => "assistant_message_start",
            ProtocolEvent::AssistantMessageChunk { .. } => "assistant_message_chunk",
            ProtocolEvent::AssistantMessageEnd { .. } => "assistant_message_end",
            ProtocolEvent::ToolCallStart { .. } => "tool_call_start",
            ProtocolEvent::ToolCallProgress { .. } => "tool_call_progress",
            ProtocolEvent::ToolCallEnd { .. } => "tool_call_end",
            ProtocolEvent::ProcessingStatus { .. } => "processing_status",
            ProtocolEvent::Error { .. } => "error",
            ProtocolEvent::DesignDocumentGenerated { .. } => "design_document_generated",
            ProtocolEvent::PrefabsInfo { .. } => "prefabs_info",
            ProtocolEvent::DocumentEditProposal { .. } => "document_edit_proposal",
            ProtocolEvent::Heartbeat => "heartbeat",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_name_matches_serde_tag() {
        let ev = ProtocolEvent::AssistantMessageChunk {
            content: "hi".into(),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], ev.kind_name());
    }

    #[test]
    fn error_event_serializes_fields() {
        let ev = ProtocolEvent::Error {
            kind: "rate_limit".into(),
            message: "slow down".into(),
            recoverable: true,
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["kind"], "rate_limit");
        assert_eq!(v["recoverable"], true);
    }
}
