//! `database_design` (spec §4.3 table): `user_requirements`, `system_design`,
//! optional plan/prefabs → a `database_design.md` document. Intended to run
//! after `design`, so `system_design` is read from the argument when given
//! and otherwise falls back to the most recent `design.md` in the turn's
//! generated documents.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::llm::ChatRequest;
use crate::message::Message;
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct DatabaseDesignTool;

const SYSTEM_PROMPT: &str = "You are the database design stage of a software design assistant. \
Produce a complete database_design.md: schema, tables, relationships, and indexing notes, \
consistent with the given system design.";

#[async_trait]
impl Tool for DatabaseDesignTool {
    fn name(&self) -> &str {
        "database_design"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "database_design".into(),
            description: "Produce a database_design.md consistent with the system design, user requirements, plan, and prefabs.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "user_requirements": {"type": "string"},
                    "system_design": {"type": "string"},
                    "prior_plan": {"type": "string"},
                },
                "required": ["user_requirements"],
            }),
            required: vec!["user_requirements".into()],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        let user_requirements = args
            .get("user_requirements")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("user_requirements"))?;

        let system_design = args
            .get("system_design")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| ctx.latest_document("design.md").map(|d| d.content.clone()))
            .ok_or_else(|| crate::registry::validation_error("system_design"))?;

        let prior_plan = args.get("prior_plan").and_then(|v| v.as_str()).or(ctx.short_planning.as_deref());

        let llm = ctx
            .llm
            .as_ref()
            .ok_or_else(|| AgentError::Other("database_design requires an LLM client".into()))?;

        let mut prompt = format!("User requirements:\n{user_requirements}\n\nSystem design:\n{system_design}\n");
        if let Some(plan) = prior_plan {
            prompt.push_str(&format!("\nProject plan:\n{plan}\n"));
        }
        if !ctx.recommended_prefabs.is_empty() {
            let names: Vec<&str> = ctx.recommended_prefabs.iter().map(|p| p.name.as_str()).collect();
            prompt.push_str(&format!("\nRecommended prefabs: {}\n", names.join(", ")));
        }

        let request = ChatRequest::new(vec![Message::user(prompt, ctx.now)]).with_system_prompt(SYSTEM_PROMPT);
        let response = llm.chat_completion(request).await?;

        let document = crate::context::GeneratedDocument {
            doc_type: "database_design".into(),
            filename: "database_design.md".into(),
            content: response.content.clone(),
            timestamp: ctx.now,
        };

        ctx.emit(stream_event::event::ProtocolEvent::DesignDocumentGenerated {
            filename: document.filename.clone(),
            content: document.content.clone(),
        })
        .await;

        Ok(ToolOutcome::with_update(
            serde_json::json!({
                "generation_success": !response.content.is_empty(),
                "filename": document.filename,
            }),
            ResultUpdate::GeneratedDocument(document),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GeneratedDocument;
    use crate::llm::mock::MockLlmClient;
    use crate::llm::LlmResponse;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx_with_mock(reply: &str, generated_documents: Vec<GeneratedDocument>) -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: vec![],
            generated_documents,
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("DBDESIGN_TEST_")),
            llm: Some(Arc::new(MockLlmClient::new(vec![LlmResponse {
                content: reply.to_string(),
                tool_calls: vec![],
                usage: None,
            }]))),
            http: reqwest::Client::new(),
            streaming_session: None,
            now: 0.0,
        }
    }

    #[tokio::test]
    async fn falls_back_to_latest_design_document() {
        let tool = DatabaseDesignTool;
        let design_doc = GeneratedDocument {
            doc_type: "design".into(),
            filename: "design.md".into(),
            content: "# Design\nservices: api, worker".into(),
            timestamp: 1.0,
        };
        let ctx = ctx_with_mock("# Database Design\n...", vec![design_doc]);
        let outcome = tool
            .call(serde_json::json!({"user_requirements": "a todo app"}), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.content["generation_success"], true);
        assert_eq!(outcome.content["filename"], "database_design.md");
    }

    #[tokio::test]
    async fn missing_system_design_without_prior_design_is_validation_error() {
        let tool = DatabaseDesignTool;
        let ctx = ctx_with_mock("ignored", vec![]);
        let err = tool.call(serde_json::json!({"user_requirements": "a todo app"}), &ctx).await;
        assert!(err.is_err());
    }
}
