//! Tool registry and dispatch (spec §4.3): declarative schemas, argument
//! validation, parallel execution, and result extraction into `Shared`.
//!
//! Grounded on `loom/src/tools/trait.rs`'s `Tool` trait (`name`/`spec`/`call`)
//! and `graphweave/src/tools/registry.rs`'s name-keyed `ToolRegistry`,
//! generalized so `call` takes a read-only [`ToolContext`] snapshot instead of
//! the teacher's optional `ToolCallContext`, and so dispatch runs every tool
//! call for one assistant turn concurrently (`loom`'s `ActNode` calls tools in
//! a sequential `for` loop; spec §4.3 requires parallel execution — this is
//! the clearest "keep HOW, replace WHAT" deviation from the literal teacher
//! code, called out in DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::Instrument;

use crate::context::{GeneratedDocument, PendingEdit, PrefabMatch};
use crate::error::AgentError;
use crate::llm::{LlmClient, ToolDefinition};
use crate::message::{Message, ToolCall};
use crate::stream::StreamingSession;
use config::PlannerConfig;
use stream_event::event::ProtocolEvent;

/// One tool's declarative schema (spec §4.3 Registry, §6 "Tool-call JSON
/// schemas").
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub required: Vec<String>,
}

impl ToolSpec {
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Read-only snapshot of the parts of `Shared` a tool may consult, built once
/// per dispatch so concurrent handlers never contend on the orchestrator's
/// own state (spec §4.3 "Two concurrent handlers may read the same keys...
/// but must not write to the same top-level key").
pub struct ToolContext {
    pub session_id: String,
    pub language: String,
    pub dialogue_history: Vec<Message>,
    pub recommended_prefabs: Vec<PrefabMatch>,
    pub generated_documents: Vec<GeneratedDocument>,
    pub pending_document_edits: HashMap<String, PendingEdit>,
    pub short_planning: Option<String>,
    pub config: Arc<PlannerConfig>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub http: reqwest::Client,
    pub streaming_session: Option<Arc<StreamingSession>>,
    pub now: f64,
}

impl ToolContext {
    /// Latest content for `filename` across `generated_documents` (spec §3
    /// Invariant 4: "the most recent timestamp wins").
    pub fn latest_document(&self, filename: &str) -> Option<&GeneratedDocument> {
        self.generated_documents
            .iter()
            .filter(|d| d.filename == filename)
            .max_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub async fn emit(&self, event: ProtocolEvent) {
        if let Some(session) = &self.streaming_session {
            session.emit(event).await;
        }
    }
}

/// What a successful tool call contributes back into `Shared` (spec §4.3
/// "Result extraction"), folded in after all handlers for the turn finish.
pub enum ResultUpdate {
    None,
    RecommendedPrefabs(Vec<PrefabMatch>),
    ResearchFindings(Value),
    ShortPlanning(String),
    GeneratedDocument(GeneratedDocument),
    GeneratedDocuments(Vec<GeneratedDocument>),
    PendingEdit(PendingEdit),
}

/// Outcome of one tool call: the JSON payload that becomes the `tool`
/// message's `content`, plus the update to fold into `Shared`.
pub struct ToolOutcome {
    pub content: Value,
    pub update: ResultUpdate,
}

impl ToolOutcome {
    pub fn new(content: Value) -> Self {
        Self {
            content,
            update: ResultUpdate::None,
        }
    }

    pub fn with_update(content: Value, update: ResultUpdate) -> Self {
        Self { content, update }
    }

    pub fn disabled(suggestion: &str) -> Self {
        Self::new(serde_json::json!({
            "success": false,
            "suggestion": suggestion,
        }))
    }
}

/// One registered tool (spec §4.3 Registry entry).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError>;
}

/// Name-keyed table of tools, exposing a per-LLM tools array and dispatch
/// (spec §4.3 "A static table keyed by tool name").
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Serializes every registered tool into the LLM's native tools array
    /// (spec §4.3 "a per-language-model serialization as a tools array").
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.spec().to_definition()).collect()
    }
}

/// One dispatched call's raw outcome, paired with its originating `ToolCall`
/// so the caller can rebuild `tool` messages in the original order even
/// though completion order is unconstrained (spec §5 ordering guarantee v).
struct DispatchedCall {
    call: ToolCall,
    content: Value,
    update: ResultUpdate,
}

/// Validates, dispatches (concurrently), and folds results for every tool
/// call in one assistant turn (spec §4.3 "Argument validation", "Parallel
/// execution", "Result extraction").
///
/// Returns, in the original `tool_calls` order, the `tool` messages to append
/// to both the working conversation and `shared.new_messages`, plus the list
/// of [`ResultUpdate`]s to fold into `shared.results` (spec §4.3's "only after
/// all handlers finish").
pub async fn dispatch_tool_calls(
    registry: &ToolRegistry,
    tool_calls: &[ToolCall],
    ctx: Arc<ToolContext>,
    now: f64,
) -> (Vec<Message>, Vec<ResultUpdate>) {
    let mut tasks = Vec::with_capacity(tool_calls.len());

    for call in tool_calls {
        let call = call.clone();
        let registry_tool = registry.get(&call.function.name);
        let ctx = ctx.clone();
        let span = tracing::info_span!("tool_call", name = %call.function.name, call_id = %call.id);

        tasks.push(tokio::spawn(async move {
            let start = Instant::now();
            if let Some(session) = &ctx.streaming_session {
                session
                    .emit(ProtocolEvent::ToolCallStart {
                        call_id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call
                            .parsed_arguments()
                            .unwrap_or(Value::Null),
                    })
                    .await;
            }

            let outcome = run_one_call(registry_tool, &call, &ctx).await;

            if let Some(session) = &ctx.streaming_session {
                session
                    .emit(ProtocolEvent::ToolCallEnd {
                        call_id: call.id.clone(),
                        name: call.function.name.clone(),
                        success: outcome.1,
                        duration_ms: start.elapsed().as_millis() as u64,
                    })
                    .await;
            }

            DispatchedCall {
                call,
                content: outcome.0,
                update: outcome.2,
            }
        }.instrument(span)));
    }

    let joined = join_all(tasks).await;
    let mut by_id: HashMap<String, DispatchedCall> = HashMap::new();
    for handle in joined {
        match handle {
            Ok(dispatched) => {
                by_id.insert(dispatched.call.id.clone(), dispatched);
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "tool task panicked");
            }
        }
    }

    let mut messages = Vec::with_capacity(tool_calls.len());
    let mut updates = Vec::new();
    for call in tool_calls {
        if let Some(dispatched) = by_id.remove(&call.id) {
            messages.push(Message::tool(dispatched.content.to_string(), now, call.id.clone()));
            if !matches!(dispatched.update, ResultUpdate::None) {
                updates.push(dispatched.update);
            }
        } else {
            // Task panicked; surface a failure payload rather than dropping the pairing.
            let failure = serde_json::json!({"success": false, "error": "tool task failed unexpectedly"});
            messages.push(Message::tool(failure.to_string(), now, call.id.clone()));
        }
    }

    (messages, updates)
}

/// Validates `call`'s arguments against the registered spec (if any) and
/// invokes the handler. Returns `(content, success, update)` so the caller
/// can emit `ToolCallEnd` uniformly for both validation failures and handler
/// errors (spec §4.3 "A failed validation becomes a `tool` message... without
/// invoking the handler").
async fn run_one_call(
    tool: Option<Arc<dyn Tool>>,
    call: &ToolCall,
    ctx: &ToolContext,
) -> (Value, bool, ResultUpdate) {
    let Some(tool) = tool else {
        return (
            serde_json::json!({
                "success": false,
                "error": format!("unknown tool: {}", call.function.name),
            }),
            false,
            ResultUpdate::None,
        );
    };

    let args = match call.parsed_arguments() {
        Ok(v) => v,
        Err(e) => {
            return (
                serde_json::json!({"success": false, "error": format!("invalid argument JSON: {e}")}),
                false,
                ResultUpdate::None,
            );
        }
    };

    if let Some(missing) = missing_required_field(&tool.spec(), &args) {
        return (
            serde_json::json!({
                "success": false,
                "error": format!("Missing required parameter: {missing}"),
            }),
            false,
            ResultUpdate::None,
        );
    }

    match tool.call(args, ctx).await {
        Ok(outcome) => (outcome.content, true, outcome.update),
        Err(e) => {
            tracing::warn!(tool = %call.function.name, error = %e, "tool call failed");
            (
                serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "error_kind": e.kind().wire_name(),
                }),
                false,
                ResultUpdate::None,
            )
        }
    }
}

fn missing_required_field(spec: &ToolSpec, args: &Value) -> Option<String> {
    let obj = args.as_object();
    spec.required.iter().find_map(|field| {
        let present = obj.map(|o| o.contains_key(field)).unwrap_or(false);
        if present {
            None
        } else {
            Some(field.clone())
        }
    })
}

/// Classifies a missing required field as a validation error, for callers
/// that want an [`AgentError`] rather than a JSON payload (spec §7
/// `validation` kind).
pub fn validation_error(field: &str) -> AgentError {
    AgentError::Validation(format!("Missing required parameter: {field}"))
}
