//! Concrete LLM transport over an OpenAI-compatible chat completions API
//! (spec §4.4.a AMBIENT). Grounded on the teacher's `ChatOpenAI` (same
//! `async-openai` crate, same `base_url` env override idea).

use async_trait::async_trait;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall as OpenAiFunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use futures::StreamExt;

use super::{ChatChunk, ChatRequest, ChatStream, LlmClient, LlmResponse, LlmUsage, ToolCallDelta};
use crate::error::{AgentError, ErrorKind};
use crate::message::{Role, ToolCall};

/// Chat completion client over any OpenAI-compatible HTTP endpoint.
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>, model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    fn to_request_messages(
        &self,
        request: &ChatRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
        let mut out = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = &request.system_prompt {
            out.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt.clone())
                    .build()
                    .map_err(|e| AgentError::Other(e.to_string()))?
                    .into(),
            );
        }
        for msg in &request.messages {
            let converted = match msg.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content.clone())
                    .build()
                    .map_err(|e| AgentError::Other(e.to_string()))?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()
                    .map_err(|e| AgentError::Other(e.to_string()))?
                    .into(),
                Role::Assistant => {
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    builder.content(msg.content.clone());
                    if let Some(calls) = &msg.tool_calls {
                        if !calls.is_empty() {
                            let converted: Vec<ChatCompletionMessageToolCall> = calls
                                .iter()
                                .map(|c| ChatCompletionMessageToolCall {
                                    id: c.id.clone(),
                                    r#type: ChatCompletionToolType::Function,
                                    function: OpenAiFunctionCall {
                                        name: c.function.name.clone(),
                                        arguments: c.function.arguments.clone(),
                                    },
                                })
                                .collect();
                            builder.tool_calls(converted);
                        }
                    }
                    ChatCompletionRequestMessage::Assistant(
                        builder.build().map_err(|e| AgentError::Other(e.to_string()))?,
                    )
                }
                Role::Tool => {
                    let tool_call_id = msg.tool_call_id.clone().unwrap_or_default();
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(msg.content.clone())
                        .tool_call_id(tool_call_id)
                        .build()
                        .map_err(|e| AgentError::Other(e.to_string()))?
                        .into()
                }
            };
            out.push(converted);
        }
        Ok(out)
    }

    fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<async_openai::types::CreateChatCompletionRequest, AgentError> {
        let messages = self.to_request_messages(request)?;
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.model.clone())
            .messages(messages)
            .temperature(request.temperature);

        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(|t| {
                    ChatCompletionToolArgs::default()
                        .r#type(ChatCompletionToolType::Function)
                        .function(
                            FunctionObjectArgs::default()
                                .name(t.name.clone())
                                .description(t.description.clone())
                                .parameters(t.parameters.clone())
                                .build()
                                .map_err(|e| AgentError::Other(e.to_string()))?,
                        )
                        .build()
                        .map_err(|e| AgentError::Other(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder.tools(tools);
            builder.parallel_tool_calls(request.parallel_tool_calls);
        }

        builder.build().map_err(|e| AgentError::Other(e.to_string()))
    }

    fn classify_openai_error(err: &async_openai::error::OpenAIError) -> AgentError {
        use async_openai::error::OpenAIError;
        match err {
            OpenAIError::ApiError(api_err) => {
                let status = api_err.code.as_deref().unwrap_or("");
                let kind = match status {
                    "429" | "rate_limit_exceeded" => ErrorKind::RateLimit,
                    "401" => ErrorKind::Authentication,
                    "403" => ErrorKind::Permission,
                    "404" => ErrorKind::NotFound,
                    s if s.starts_with('5') => ErrorKind::ServerError,
                    s if s.starts_with('4') => ErrorKind::BadRequest,
                    _ => ErrorKind::Unknown,
                };
                AgentError::Llm {
                    kind,
                    message: api_err.message.clone(),
                    retry_after: None,
                }
            }
            OpenAIError::Reqwest(e) => {
                let kind = if e.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Network
                };
                AgentError::Llm {
                    kind,
                    message: e.to_string(),
                    retry_after: None,
                }
            }
            other => AgentError::Llm {
                kind: ErrorKind::Unknown,
                message: other.to_string(),
                retry_after: None,
            },
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<LlmResponse, AgentError> {
        let req = self.build_request(&request)?;
        let response = self
            .client
            .chat()
            .create(req)
            .await
            .map_err(|e| Self::classify_openai_error(&e))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Other("no choices in response".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content,
            tool_calls,
            usage,
        })
    }

    async fn chat_completion_stream(&self, request: ChatRequest) -> Result<ChatStream, AgentError> {
        let req = self.build_request(&request)?;
        let upstream = self
            .client
            .chat()
            .create_stream(req)
            .await
            .map_err(|e| Self::classify_openai_error(&e))?;

        let mapped = upstream.map(|item| {
            item.map(|resp| {
                let mut chunk = ChatChunk::default();
                if let Some(choice) = resp.choices.into_iter().next() {
                    if let Some(content) = choice.delta.content {
                        chunk.content = content;
                    }
                    if let Some(deltas) = choice.delta.tool_calls {
                        for d in deltas {
                            chunk.tool_call_deltas.push(ToolCallDelta {
                                index: d.index as usize,
                                id: d.id,
                                name: d.function.as_ref().and_then(|f| f.name.clone()),
                                arguments_delta: d
                                    .function
                                    .as_ref()
                                    .and_then(|f| f.arguments.clone())
                                    .unwrap_or_default(),
                            });
                        }
                    }
                }
                if let Some(u) = resp.usage {
                    chunk.usage = Some(LlmUsage {
                        prompt_tokens: u.prompt_tokens,
                        completion_tokens: u.completion_tokens,
                        total_tokens: u.total_tokens,
                    });
                }
                chunk
            })
            .map_err(|e| Self::classify_openai_error(&e))
        });

        Ok(Box::pin(mapped))
    }
}
