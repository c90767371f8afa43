//! `search_prefabs` (spec §4.3 table): local fuzzy match over the embedded
//! catalog, always available — no external service required.

use async_trait::async_trait;
use serde_json::Value;

use super::prefab_catalog;
use crate::error::AgentError;
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

#[derive(Default)]
pub struct SearchPrefabsTool;

#[async_trait]
impl Tool for SearchPrefabsTool {
    fn name(&self) -> &str {
        "search_prefabs"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_prefabs".into(),
            description: "Search the local prefab catalog by free-text query, tags, or author. Always available.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Free-text search terms"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "author": {"type": "string"},
                    "limit": {"type": "integer", "default": 10},
                },
                "required": [],
            }),
            required: vec![],
        }
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        let query = args.get("query").and_then(|v| v.as_str());
        let tags: Vec<String> = args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let author = args.get("author").and_then(|v| v.as_str());
        let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;

        let matches = prefab_catalog::search(query, &tags, author, limit);

        Ok(ToolOutcome::with_update(
            serde_json::json!({
                "success": true,
                "count": matches.len(),
                "prefabs": matches,
            }),
            ResultUpdate::RecommendedPrefabs(matches),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PrefabMatch;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn test_ctx() -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: Vec::<PrefabMatch>::new(),
            generated_documents: vec![],
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("SEARCH_TEST_")),
            llm: None,
            http: reqwest::Client::new(),
            streaming_session: None,
            now: 0.0,
        }
    }

    #[tokio::test]
    async fn search_by_query_returns_matches() {
        let tool = SearchPrefabsTool;
        let args = serde_json::json!({"query": "pdf extraction"});
        let outcome = tool.call(args, &test_ctx()).await.unwrap();
        assert_eq!(outcome.content["success"], true);
        assert!(outcome.content["count"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn no_filters_returns_everything_up_to_default_limit() {
        let tool = SearchPrefabsTool;
        let outcome = tool.call(serde_json::json!({}), &test_ctx()).await.unwrap();
        assert!(outcome.content["count"].as_u64().unwrap() > 0);
    }
}
