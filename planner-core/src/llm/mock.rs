//! Scripted LLM client for orchestrator tests, grounded on the teacher's
//! `MockLlm` (fixed/sequenced responses, no network).

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use super::{ChatChunk, ChatRequest, ChatStream, LlmClient, LlmResponse};
use crate::error::AgentError;

/// A client that returns one scripted [`LlmResponse`] per call, cycling
/// through `responses` in order and repeating the last one once exhausted.
pub struct MockLlmClient {
    responses: Mutex<Vec<LlmResponse>>,
    cursor: Mutex<usize>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            cursor: Mutex::new(0),
        }
    }

    fn next_response(&self) -> LlmResponse {
        let responses = self.responses.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        let idx = (*cursor).min(responses.len().saturating_sub(1));
        let resp = responses.get(idx).cloned().unwrap_or_default();
        if *cursor + 1 < responses.len() {
            *cursor += 1;
        }
        resp
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat_completion(&self, _request: ChatRequest) -> Result<LlmResponse, AgentError> {
        Ok(self.next_response())
    }

    async fn chat_completion_stream(&self, _request: ChatRequest) -> Result<ChatStream, AgentError> {
        let resp = self.next_response();
        let chunk = ChatChunk {
            content: resp.content,
            tool_call_deltas: resp
                .tool_calls
                .into_iter()
                .enumerate()
                .map(|(index, call)| super::ToolCallDelta {
                    index,
                    id: Some(call.id),
                    name: Some(call.function.name),
                    arguments_delta: call.function.arguments,
                })
                .collect(),
            usage: resp.usage,
        };
        Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_scripted_response() {
        let client = MockLlmClient::new(vec![LlmResponse {
            content: "hello".into(),
            tool_calls: vec![],
            usage: None,
        }]);
        let resp = client.chat_completion(ChatRequest::new(vec![])).await.unwrap();
        assert_eq!(resp.content, "hello");
    }

    #[tokio::test]
    async fn streams_one_chunk_with_tool_call_deltas() {
        use crate::message::ToolCall;
        let client = MockLlmClient::new(vec![LlmResponse {
            content: "checking".into(),
            tool_calls: vec![ToolCall::new("call_1", "search_prefabs", "{}")],
            usage: None,
        }]);
        let mut stream = client.chat_completion_stream(ChatRequest::new(vec![])).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.content, "checking");
        assert_eq!(chunk.tool_call_deltas.len(), 1);
        assert_eq!(chunk.tool_call_deltas[0].name.as_deref(), Some("search_prefabs"));
    }

    #[tokio::test]
    async fn repeats_last_response_once_exhausted() {
        let client = MockLlmClient::new(vec![
            LlmResponse { content: "a".into(), tool_calls: vec![], usage: None },
            LlmResponse { content: "b".into(), tool_calls: vec![], usage: None },
        ]);
        let _ = client.chat_completion(ChatRequest::new(vec![])).await.unwrap();
        let _ = client.chat_completion(ChatRequest::new(vec![])).await.unwrap();
        let third = client.chat_completion(ChatRequest::new(vec![])).await.unwrap();
        assert_eq!(third.content, "b");
    }
}
