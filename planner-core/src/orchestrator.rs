//! The ReAct orchestrator (spec §4.1): the bounded, iterative LLM/tool cycle.
//!
//! Never literal recursion — `depth: u32` is threaded through an explicit
//! loop, per the Design Notes. One call to [`Orchestrator::run`] drives the
//! whole turn: it builds `Shared` from the caller's context, streams the LLM
//! through the tag filter, dispatches any tool calls in parallel via
//! [`crate::registry::dispatch_tool_calls`], and loops back until the model
//! stops calling tools or the depth bound is hit.

use std::sync::Arc;

use stream_event::event::ProtocolEvent;

use crate::context::{AgentContext, AgentResult, GeneratedDocument, Shared};
use crate::error::AgentError;
use crate::llm::retry::RetryManager;
use crate::llm::{ChatRequest, LlmClient};
use crate::message::{Message, ToolCall};
use crate::registry::{self, ResultUpdate, ToolContext, ToolRegistry};
use crate::stream::StreamingSession;
use crate::tag_filter::TagFilter;

/// Default recursion depth bound (spec §4.1 "default 5").
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 5;

/// Which event kinds the caller wants delivered (spec §4.1 "a small callback
/// table naming which event kinds the caller wants delivered"). All default
/// to subscribed; a caller not interested in token-level detail simply
/// leaves `llm_chunk` unset rather than the orchestrator skipping emission.
#[derive(Clone, Copy, Debug)]
pub struct Callbacks {
    pub llm_start: bool,
    pub llm_chunk: bool,
    pub llm_end: bool,
    pub tool_start: bool,
    pub tool_progress: bool,
    pub tool_end: bool,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            llm_start: true,
            llm_chunk: true,
            llm_end: true,
            tool_start: true,
            tool_progress: true,
            tool_end: true,
        }
    }
}

/// Assembles the subsystems one turn needs: the tool catalogue, the LLM
/// client, configuration, and the process-wide HTTP client pool (spec §5
/// "Resource acquisition... a process-wide singleton").
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    config: Arc<config::PlannerConfig>,
    http: reqwest::Client,
    max_recursion_depth: u32,
}

#[derive(Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl Orchestrator {
    pub fn new(registry: Arc<ToolRegistry>, llm: Arc<dyn LlmClient>, config: Arc<config::PlannerConfig>) -> Self {
        Self {
            registry,
            llm,
            config,
            http: reqwest::Client::new(),
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Runs one full turn (spec §4.1 "Public contract").
    pub async fn run(
        &self,
        user_input: &str,
        context: &AgentContext,
        streaming_session: Option<Arc<StreamingSession>>,
        callbacks: Callbacks,
        language: &str,
        now: f64,
    ) -> AgentResult {
        let mut shared = match crate::context::create_shared_dict(user_input, context, language, streaming_session, now) {
            Ok(shared) => shared,
            Err(e) => return crate::context::error_result(&AgentError::Other(e.to_string()), vec![], 0.0),
        };

        if let Some(session) = &shared.streaming_session {
            session.emit(ProtocolEvent::ConversationStart).await;
        }

        let system_prompt = self.build_system_prompt(language, &shared.results.generated_documents);
        let mut messages = shared.dialogue_history.clone();

        let mut depth = 0u32;
        loop {
            let outcome = self.cycle(&system_prompt, &mut messages, &mut shared, &callbacks, depth, now).await;
            // Record completed cycles, not the depth entering this cycle —
            // spec testable property 5 pins `react_cycle_count` to the
            // number of cycles run (e.g. `max_recursion_depth=2` with a tool
            // called every round completes exactly 2 cycles before aborting).
            depth += 1;
            shared.react_cycle_count = depth;

            match outcome {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    shared.push_error("orchestrator", e.to_string(), now);
                    shared.react_error = Some(e.to_string());
                    break;
                }
            }

            if depth >= self.max_recursion_depth {
                let notice = Message::assistant("max-depth reached", now, vec![]);
                shared.new_messages.push(notice);
                break;
            }
        }

        if let Some(session) = &shared.streaming_session {
            session.emit(ProtocolEvent::ConversationEnd).await;
        }

        crate::context::create_agent_result(shared, 0.0)
    }

    /// Runs one `LLM_PENDING -> STREAMING -> (TOOLS* | DONE)` cycle (spec
    /// §4.1 algorithm step 3). Returns `Ok(true)` when the cycle produced
    /// tool calls (caller should recurse), `Ok(false)` when the turn is done.
    async fn cycle(
        &self,
        system_prompt: &str,
        messages: &mut Vec<Message>,
        shared: &mut Shared,
        callbacks: &Callbacks,
        depth: u32,
        now: f64,
    ) -> Result<bool, AgentError> {
        let span = tracing::info_span!("react_cycle", session_id = %shared.session_id, depth);
        let _enter = span.enter();
        tracing::info!("cycle start");

        if let (Some(session), true) = (&shared.streaming_session, callbacks.llm_start) {
            session.emit(ProtocolEvent::AssistantMessageStart).await;
        }

        let request = ChatRequest::new(messages.clone())
            .with_system_prompt(system_prompt.to_string())
            .with_tools(self.registry.to_definitions());

        let mut retry = RetryManager::new();
        let llm = self.llm.clone();
        let req_for_retry = request.clone();
        let mut stream = retry
            .run(|| {
                let llm = llm.clone();
                let request = req_for_retry.clone();
                async move { llm.chat_completion_stream(request).await }
            })
            .await?;

        let mut filter = TagFilter::new();
        let mut builders: Vec<ToolCallBuilder> = Vec::new();
        let mut assistant_content = String::new();

        use futures::StreamExt;
        while let Some(item) = stream.next().await {
            let chunk = item?;
            let filtered = filter.process_chunk(&chunk.content);
            assistant_content.push_str(&filtered.text);

            for delta in &chunk.tool_call_deltas {
                apply_delta(&mut builders, delta.index, delta.id.as_deref(), delta.name.as_deref(), &delta.arguments_delta);
            }
            for synthesized in &filtered.tool_calls {
                let index = builders.len();
                apply_delta(&mut builders, index, Some(synthesized.id.as_str()), Some(synthesized.name.as_str()), &synthesized.arguments);
            }

            if !filtered.text.is_empty() {
                tracing::debug!(chars = filtered.text.len(), "llm chunk");
                if let (Some(session), true) = (&shared.streaming_session, callbacks.llm_chunk) {
                    session
                        .emit(ProtocolEvent::AssistantMessageChunk {
                            content: filtered.text.clone(),
                        })
                        .await;
                }
            }
        }

        let flushed = filter.finalize();
        assistant_content.push_str(&flushed.text);
        for synthesized in &flushed.tool_calls {
            let index = builders.len();
            apply_delta(&mut builders, index, Some(synthesized.id.as_str()), Some(synthesized.name.as_str()), &synthesized.arguments);
        }

        let tool_calls: Vec<ToolCall> = builders
            .into_iter()
            .filter(|b| !b.id.is_empty())
            .map(|b| ToolCall::new(b.id, b.name, b.arguments))
            .collect();

        let assistant_message = Message::assistant(assistant_content.clone(), now, tool_calls.clone());
        shared.new_messages.push(assistant_message.clone());

        if tool_calls.is_empty() {
            if let (Some(session), true) = (&shared.streaming_session, callbacks.llm_end) {
                session
                    .emit(ProtocolEvent::AssistantMessageEnd {
                        content: assistant_content,
                        tool_call_count: 0,
                    })
                    .await;
            }
            tracing::info!("cycle end, no tool calls");
            return Ok(false);
        }

        messages.push(assistant_message);

        let ctx = Arc::new(ToolContext {
            session_id: shared.session_id.clone(),
            language: shared.language.clone(),
            dialogue_history: messages.clone(),
            recommended_prefabs: shared.results.recommended_prefabs.clone(),
            generated_documents: shared.results.generated_documents.clone(),
            pending_document_edits: shared.results.pending_document_edits.clone(),
            short_planning: shared.results.short_planning.clone(),
            config: self.config.clone(),
            llm: Some(self.llm.clone()),
            http: self.http.clone(),
            streaming_session: shared.streaming_session.clone(),
            now,
        });

        let (tool_messages, updates) = registry::dispatch_tool_calls(&self.registry, &tool_calls, ctx, now).await;

        for message in &tool_messages {
            messages.push(message.clone());
            shared.new_messages.push(message.clone());
        }
        for call in &tool_calls {
            shared.tool_call_ids.push(call.id.clone());
        }
        fold_updates(shared, updates);

        if let (Some(session), true) = (&shared.streaming_session, callbacks.llm_end) {
            session
                .emit(ProtocolEvent::AssistantMessageEnd {
                    content: assistant_content,
                    tool_call_count: tool_calls.len(),
                })
                .await;
        }

        tracing::info!(tool_calls = tool_calls.len(), "cycle end, dispatched tools");
        Ok(true)
    }

    /// Builds the system prompt, augmented with the turn's available
    /// generated documents (spec §4.1 step 2: "augmented at send time with a
    /// dynamically built 'available documents' list"). The multilingual
    /// prompt template store itself is an external collaborator (§1
    /// Non-goals); this is the core's own minimal default.
    fn build_system_prompt(&self, language: &str, documents: &[GeneratedDocument]) -> String {
        let mut prompt = format!(
            "You are a planning agent that turns product ideas into system design documents. \
             Respond in the user's language (default: {language}). Use the available tools to \
             research, plan, design, and refine documents as needed."
        );
        if !documents.is_empty() {
            prompt.push_str("\n\nAvailable documents this turn:\n");
            for doc in documents {
                prompt.push_str(&format!("- {} ({})\n", doc.filename, doc.doc_type));
            }
        }
        prompt
    }
}

fn apply_delta(builders: &mut Vec<ToolCallBuilder>, index: usize, id: Option<&str>, name: Option<&str>, arguments_delta: &str) {
    if index >= builders.len() {
        builders.resize_with(index + 1, ToolCallBuilder::default);
    }
    let builder = &mut builders[index];
    if let Some(id) = id {
        builder.id.push_str(id);
    }
    if let Some(name) = name {
        builder.name.push_str(name);
    }
    builder.arguments.push_str(arguments_delta);
}

fn fold_updates(shared: &mut Shared, updates: Vec<ResultUpdate>) {
    for update in updates {
        match update {
            ResultUpdate::None => {}
            ResultUpdate::RecommendedPrefabs(prefabs) => shared.results.recommended_prefabs = prefabs,
            ResultUpdate::ResearchFindings(findings) => shared.results.research_findings = Some(findings),
            ResultUpdate::ShortPlanning(plan) => shared.results.short_planning = Some(plan),
            ResultUpdate::GeneratedDocument(doc) => shared.results.generated_documents.push(doc),
            ResultUpdate::GeneratedDocuments(docs) => shared.results.generated_documents.extend(docs),
            ResultUpdate::PendingEdit(edit) => {
                shared.results.pending_document_edits.insert(edit.proposal_id.clone(), edit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmClient;
    use crate::llm::LlmResponse;
    use crate::message::ToolCall as MsgToolCall;

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        crate::tools::register_all(&mut registry);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn plain_response_without_tool_calls_ends_the_turn() {
        let llm = Arc::new(MockLlmClient::new(vec![LlmResponse {
            content: "Here is my answer.".into(),
            tool_calls: vec![],
            usage: None,
        }]));
        let config = Arc::new(config::PlannerConfig::from_env("ORCH_TEST1_"));
        let orchestrator = Orchestrator::new(registry_with_echo(), llm, config);

        let ctx = AgentContext {
            session_id: "sess-1".into(),
            ..Default::default()
        };
        let result = orchestrator
            .run("build me a todo app", &ctx, None, Callbacks::default(), "en", 0.0)
            .await;

        assert!(result.success);
        assert_eq!(result.new_messages.len(), 1);
        assert_eq!(result.new_messages[0].content, "Here is my answer.");
    }

    #[tokio::test]
    async fn tool_call_round_trips_into_new_messages_and_recurses() {
        let first = LlmResponse {
            content: "Let me search.".into(),
            tool_calls: vec![MsgToolCall::new("call_1", "search_prefabs", r#"{"query":"pdf"}"#)],
            usage: None,
        };
        let second = LlmResponse {
            content: "Found it.".into(),
            tool_calls: vec![],
            usage: None,
        };
        let llm = Arc::new(MockLlmClient::new(vec![first, second]));
        let config = Arc::new(config::PlannerConfig::from_env("ORCH_TEST2_"));
        let orchestrator = Orchestrator::new(registry_with_echo(), llm, config);

        let ctx = AgentContext {
            session_id: "sess-2".into(),
            ..Default::default()
        };
        let result = orchestrator
            .run("find a pdf prefab", &ctx, None, Callbacks::default(), "en", 0.0)
            .await;

        assert!(result.success);
        // assistant(with tool call) + tool + assistant(final) == 3
        assert_eq!(result.new_messages.len(), 3);
        assert_eq!(result.new_messages[1].role, crate::message::Role::Tool);
        assert_eq!(result.new_messages[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(result.new_messages.last().unwrap().content, "Found it.");
    }

    #[tokio::test]
    async fn depth_limit_appends_synthetic_message_without_hanging() {
        let always_calls_tool = LlmResponse {
            content: String::new(),
            tool_calls: vec![MsgToolCall::new("call_x", "search_prefabs", r#"{"query":"x"}"#)],
            usage: None,
        };
        let llm = Arc::new(MockLlmClient::new(vec![always_calls_tool]));
        let config = Arc::new(config::PlannerConfig::from_env("ORCH_TEST3_"));
        let orchestrator = Orchestrator::new(registry_with_echo(), llm, config).with_max_recursion_depth(2);

        let ctx = AgentContext {
            session_id: "sess-3".into(),
            ..Default::default()
        };
        let result = orchestrator
            .run("loop forever", &ctx, None, Callbacks::default(), "en", 0.0)
            .await;

        assert!(result.success);
        assert_eq!(result.new_messages.last().unwrap().content, "max-depth reached");
        // spec §8 testable property 5 / scenario 5: with max_recursion_depth=2
        // and a tool called every round, the turn completes exactly 2 cycles.
        assert_eq!(result.react_cycle_count, 2);
    }
}
