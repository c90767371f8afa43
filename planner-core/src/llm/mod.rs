//! LLM client contract: non-streaming and streaming chat completion (spec §4.4).
//!
//! `LlmClient` is the trait the orchestrator depends on; `OpenAiLlmClient` is
//! the concrete transport, `MockLlmClient` the test double. Retry policy and
//! error classification live in [`retry`]; tag-filtered streaming is applied
//! by the orchestrator itself via [`crate::tag_filter::TagFilter`] so the
//! client stays a thin transport.

pub mod mock;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::message::{Message, ToolCall};

/// One tool definition as sent to the LLM's native tools array (spec §4.3,
/// §6 "Every tool's parameters are a JSON object...").
#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Request shape for one LLM call.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolDefinition>,
    pub parallel_tool_calls: bool,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system_prompt: None,
            tools: Vec::new(),
            parallel_tool_calls: true,
            temperature: 0.7,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Token usage for one call, when the provider reports it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Full (non-streaming) response from one chat completion.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
}

/// One piece of a streamed response: cleaned content plus any tool-call
/// deltas the client can already attribute to an index (spec §4.1.c
/// "coalesce into current_tool_calls[index]").
#[derive(Clone, Debug, Default)]
pub struct ChatChunk {
    pub content: String,
    pub tool_call_deltas: Vec<ToolCallDelta>,
    pub usage: Option<LlmUsage>,
}

/// Delta for one tool call arriving across possibly many chunks.
#[derive(Clone, Debug, Default)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_delta: String,
}

/// A boxed stream of chat chunks, terminated by `Ok`/`Err`.
pub type ChatStream = std::pin::Pin<Box<dyn futures::Stream<Item = Result<ChatChunk, AgentError>> + Send>>;

/// LLM client: chat completion, with and without streaming (spec §4.4).
///
/// Implementations are not responsible for retries or tag filtering; both are
/// layered on top (retry by [`retry::RetryManager`], tag filtering by the
/// orchestrator wrapping [`chat_completion_stream`](LlmClient::chat_completion_stream)'s
/// output through [`crate::tag_filter::TagFilter`]).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(&self, request: ChatRequest) -> Result<LlmResponse, AgentError>;

    async fn chat_completion_stream(&self, request: ChatRequest) -> Result<ChatStream, AgentError>;
}
