//! Dialogue message and tool-call shapes (spec §3 Message, ToolCall).
//!
//! The caller owns the dialogue history; the orchestrator only appends to it
//! within a turn. `Message` is intentionally append-only-friendly: nothing in
//! this module mutates a message after construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// The function half of a [`ToolCall`]: name plus JSON-encoded arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

/// One tool invocation requested by the model (spec §3 ToolCall).
///
/// `id` is caller-opaque; it uniquely pairs this call with the later `tool`
/// message carrying `tool_call_id == id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: ToolCallType,
    pub function: FunctionCall,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallType {
    Function,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: ToolCallType::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parses `function.arguments` as JSON. Returns `Value::Null` shaped errors
    /// as a plain `serde_json::Error` so callers can fold it into a validation
    /// failure without a second error type.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.function.arguments)
    }
}

/// One message in the dialogue (spec §3 Message).
///
/// `tool_calls` is only meaningful on `Assistant` messages; `tool_call_id`
/// only on `Tool` messages. Both are `None`/empty otherwise — the type does
/// not enforce this statically (matching the teacher's message shapes, which
/// are likewise plain structs rather than role-parameterized enums of
/// payloads), so invariants are checked at the boundaries that construct
/// messages (orchestrator, dispatcher) rather than in this type itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: f64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>, timestamp: f64) -> Self {
        Self::plain(Role::System, content, timestamp)
    }

    pub fn user(content: impl Into<String>, timestamp: f64) -> Self {
        Self::plain(Role::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: f64, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            metadata: HashMap::new(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    pub fn tool(content: impl Into<String>, timestamp: f64, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            timestamp,
            metadata: HashMap::new(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>, timestamp: f64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            metadata: HashMap::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The tool_call ids this assistant message expects paired `tool` messages
    /// for. Empty for non-assistant messages or assistant messages with no
    /// tool calls.
    pub fn expected_tool_call_ids(&self) -> Vec<&str> {
        self.tool_calls
            .as_ref()
            .map(|calls| calls.iter().map(|c| c.id.as_str()).collect())
            .unwrap_or_default()
    }
}
