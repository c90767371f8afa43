//! `view_document` (spec §4.3 table): looks up the latest content of a
//! generated document by filename (spec §3 Invariant 4: "the most recent
//! timestamp wins"). Always available — reads only from the turn's already
//! generated documents, no external call.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct ViewDocumentTool;

#[async_trait]
impl Tool for ViewDocumentTool {
    fn name(&self) -> &str {
        "view_document"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "view_document".into(),
            description: "Return the latest content of a generated document by filename (e.g. design.md, database_design.md).".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "filename": {"type": "string"},
                },
                "required": ["filename"],
            }),
            required: vec!["filename".into()],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        let filename = args
            .get("filename")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("filename"))?;

        match ctx.latest_document(filename) {
            Some(document) => Ok(ToolOutcome::new(serde_json::json!({
                "success": true,
                "filename": document.filename,
                "content": document.content,
                "timestamp": document.timestamp,
            }))),
            None => Ok(ToolOutcome::new(serde_json::json!({
                "success": false,
                "error": format!("no generated document named '{filename}'"),
            }))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GeneratedDocument;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx_with_docs() -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: vec![],
            generated_documents: vec![
                GeneratedDocument {
                    doc_type: "design".into(),
                    filename: "design.md".into(),
                    content: "first draft".into(),
                    timestamp: 1.0,
                },
                GeneratedDocument {
                    doc_type: "design".into(),
                    filename: "design.md".into(),
                    content: "second draft".into(),
                    timestamp: 2.0,
                },
            ],
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("VIEW_TEST_")),
            llm: None,
            http: reqwest::Client::new(),
            streaming_session: None,
            now: 0.0,
        }
    }

    #[tokio::test]
    async fn returns_most_recent_content_for_duplicated_filename() {
        let tool = ViewDocumentTool;
        let outcome = tool
            .call(serde_json::json!({"filename": "design.md"}), &ctx_with_docs())
            .await
            .unwrap();
        assert_eq!(outcome.content["content"], "second draft");
    }

    #[tokio::test]
    async fn unknown_filename_reports_failure_not_error() {
        let tool = ViewDocumentTool;
        let outcome = tool
            .call(serde_json::json!({"filename": "missing.md"}), &ctx_with_docs())
            .await
            .unwrap();
        assert_eq!(outcome.content["success"], false);
    }
}
