//! Request/response shape and the shared-state bridge (spec §3 AgentContext/
//! AgentResult, §4.7 Shared, §4.8 Context ↔ Shared Bridge).
//!
//! The core is sessionless: the caller owns `dialogue_history` across turns.
//! `Shared` is the mutable working map the orchestrator threads through one
//! turn; [`create_shared_dict`]/[`create_agent_result`] are the two bridge
//! functions spec §4.8 names literally. Grounded on `graphweave/src/state/
//! react_state.rs`'s `ReActState` (fields owned by name, not a duck-typed
//! dict), generalized with a typed `extensions` map for per-tool scratch keys
//! a fixed struct can't anticipate.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AgentError;
use crate::message::Message;
use crate::stream::StreamingSession;

/// One generated design artifact (spec §3 Invariant 4: identified by
/// `filename` within a session; most recent timestamp wins, history kept).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GeneratedDocument {
    pub doc_type: String,
    pub filename: String,
    pub content: String,
    pub timestamp: f64,
}

/// One edit proposal awaiting confirmation (§4.3 `edit_document`, §6 payload).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PendingEdit {
    pub proposal_id: String,
    pub document_type: String,
    pub document_filename: String,
    pub edits: Vec<EditOp>,
    pub summary: String,
    pub preview_content: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EditOp {
    pub search: String,
    pub replace: String,
    pub reason: String,
}

/// One recommended or searched prefab (§4.3 `prefab_recommend`/`search_prefabs`).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct PrefabMatch {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub score: f64,
    pub tags: Vec<String>,
}

/// Request side, read-only to the core (spec §3 AgentContext).
#[derive(Clone, Debug, Default)]
pub struct AgentContext {
    pub session_id: String,
    pub dialogue_history: Vec<Message>,
    pub tool_execution_results: ToolExecutionResults,
    pub session_metadata: HashMap<String, Value>,
    pub last_updated: f64,
}

/// The well-known `tool_execution_results` keys (spec §3), carried across
/// turns by the caller. `extra` holds anything else a tool chose to stash
/// (spec §4.7 "Nodes may add keys freely").
#[derive(Clone, Debug, Default)]
pub struct ToolExecutionResults {
    pub recommended_prefabs: Vec<PrefabMatch>,
    pub research_findings: Option<Value>,
    pub short_planning: Option<String>,
    pub generated_documents: Vec<GeneratedDocument>,
    pub pending_document_edits: HashMap<String, PendingEdit>,
    pub extra: HashMap<String, Value>,
}

/// Response side, produced by the core for one turn (spec §3 AgentResult).
#[derive(Clone, Debug)]
pub struct AgentResult {
    pub success: bool,
    pub error: Option<String>,
    pub new_messages: Vec<Message>,
    pub tool_execution_results_updates: ToolExecutionResults,
    pub metadata: HashMap<String, Value>,
    pub execution_time: f64,
    /// Number of ReAct cycles the turn completed (spec §8 testable property
    /// 4: `react_cycle_count <= max_recursion_depth` on every completed turn).
    pub react_cycle_count: u32,
}

/// One `{source, error, timestamp}` entry recorded into `shared.errors`
/// (spec §4.1 "Failure handling inside the cycle").
#[derive(Clone, Debug)]
pub struct RecordedError {
    pub source: String,
    pub error: String,
    pub timestamp: f64,
}

/// The mutable working map threaded through one turn (spec §4.7 Shared).
///
/// Owned by the orchestrator for the duration of `run`; tool handlers receive
/// a reference and write only to their own top-level output key (enforced by
/// the dispatcher's result-extraction step, not by the type system here —
/// matching the teacher's plain-struct-plus-convention approach to state
/// ownership rather than per-field locks).
pub struct Shared {
    pub session_id: String,
    pub language: String,
    pub dialogue_history: Vec<Message>,
    pub streaming_session: Option<Arc<StreamingSession>>,
    pub new_messages: Vec<Message>,
    pub errors: Vec<RecordedError>,
    pub results: ToolExecutionResults,
    pub react_cycle_count: u32,
    pub tool_call_ids: Vec<String>,
    pub react_error: Option<String>,
    pub react_post_error: Option<String>,
}

impl Shared {
    pub fn push_error(&mut self, source: impl Into<String>, error: impl Into<String>, timestamp: f64) {
        self.errors.push(RecordedError {
            source: source.into(),
            error: error.into(),
            timestamp,
        });
    }
}

/// Validation failure for [`create_shared_dict`] (spec §4.8 "validates the
/// context").
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("session_id must not be empty")]
    EmptySessionId,
}

/// Builds the per-turn working map from the caller's context (spec §4.8
/// `create_shared_dict`). Copies dialogue history, appends the new user
/// message, initializes `new_messages`/`errors` empty, and copies the
/// well-known `tool_execution_results` keys into `shared`.
pub fn create_shared_dict(
    user_input: &str,
    context: &AgentContext,
    language: &str,
    streaming_session: Option<Arc<StreamingSession>>,
    now: f64,
) -> Result<Shared, ContextError> {
    if context.session_id.trim().is_empty() {
        return Err(ContextError::EmptySessionId);
    }

    let mut dialogue_history = context.dialogue_history.clone();
    dialogue_history.push(Message::user(user_input, now));

    Ok(Shared {
        session_id: context.session_id.clone(),
        language: language.to_string(),
        dialogue_history,
        streaming_session,
        new_messages: Vec::new(),
        errors: Vec::new(),
        results: context.tool_execution_results.clone(),
        react_cycle_count: 0,
        tool_call_ids: Vec::new(),
        react_error: None,
        react_post_error: None,
    })
}

/// Packs `shared` into the turn's [`AgentResult`] (spec §4.8
/// `create_agent_result`). On `react_error`/`react_post_error`, returns a
/// failure result; otherwise collects `new_messages` and the updates to the
/// well-known result keys.
pub fn create_agent_result(shared: Shared, execution_time: f64) -> AgentResult {
    if let Some(err) = shared.react_error.or(shared.react_post_error) {
        return AgentResult {
            success: false,
            error: Some(err),
            new_messages: shared.new_messages,
            tool_execution_results_updates: ToolExecutionResults::default(),
            metadata: HashMap::new(),
            execution_time,
            react_cycle_count: shared.react_cycle_count,
        };
    }

    AgentResult {
        success: true,
        error: None,
        new_messages: shared.new_messages,
        tool_execution_results_updates: shared.results,
        metadata: HashMap::new(),
        execution_time,
        react_cycle_count: shared.react_cycle_count,
    }
}

/// Converts an in-flight [`AgentError`] into the recorded+returned shape a
/// failed turn surfaces (spec §7 "the turn returns a best-effort AgentResult
/// carrying the error").
pub fn error_result(error: &AgentError, new_messages: Vec<Message>, execution_time: f64) -> AgentResult {
    AgentResult {
        success: false,
        error: Some(error.to_string()),
        new_messages,
        tool_execution_results_updates: ToolExecutionResults::default(),
        metadata: HashMap::new(),
        execution_time,
        react_cycle_count: 0,
    }
}
