//! `prefab_recommend` (spec §4.3 table): ranked prefab recommendation via the
//! external vector service, when reachable; otherwise a disabled-tool result
//! pointing the model at `search_prefabs`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AgentError, ErrorKind};
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

#[derive(Default)]
pub struct PrefabRecommendTool;

/// Shape of one scored match returned by the vector service's `/recommend` endpoint.
#[derive(Deserialize)]
struct VectorServiceMatch {
    id: String,
    version: String,
    name: String,
    description: String,
    score: f64,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct VectorServiceResponse {
    matches: Vec<VectorServiceMatch>,
}

#[async_trait]
impl Tool for PrefabRecommendTool {
    fn name(&self) -> &str {
        "prefab_recommend"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "prefab_recommend".into(),
            description: "Ranked prefab recommendations from the vector service, optionally re-ranked with the LLM.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "top_k": {"type": "integer", "default": 5},
                    "use_llm_filter": {"type": "boolean", "default": false},
                },
                "required": ["query"],
            }),
            required: vec!["query".into()],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        if !ctx.config.prefab_recommend_enabled() {
            return Ok(ToolOutcome::disabled("use search_prefabs"));
        }

        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("query"))?;
        let top_k = args.get("top_k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let base_url = ctx.config.vector_service_base_url.as_ref().expect("checked above");
        let url = format!("{}/recommend", base_url.trim_end_matches('/'));

        let response = ctx
            .http
            .post(&url)
            .timeout(ctx.config.vector_service_timeout)
            .json(&serde_json::json!({"query": query, "top_k": top_k}))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AgentError::Llm {
                kind: status_to_kind(status.as_u16()),
                message: format!("vector service returned {status}"),
                retry_after: None,
            });
        }

        let parsed: VectorServiceResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Llm {
                kind: ErrorKind::Unknown,
                message: format!("malformed vector service response: {e}"),
                retry_after: None,
            })?;

        let matches: Vec<crate::context::PrefabMatch> = parsed
            .matches
            .into_iter()
            .map(|m| crate::context::PrefabMatch {
                id: m.id,
                version: m.version,
                name: m.name,
                description: m.description,
                score: m.score,
                tags: m.tags,
            })
            .collect();

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

fn status_to_kind(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimit,
        401 => ErrorKind::Authentication,
        403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        s if (500..600).contains(&s) => ErrorKind::ServerError,
        _ => ErrorKind::BadRequest,
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> AgentError {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    };
    AgentError::Llm {
        kind,
        message: err.to_string(),
        retry_after: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn disabled_ctx() -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: vec![],
            generated_documents: vec![],
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("RECOMMEND_TEST_")),
            llm: None,
            http: reqwest::Client::new(),
            streaming_session: None,
            now: 0.0,
        }
    }

    #[tokio::test]
    async fn returns_disabled_suggestion_without_vector_service() {
        let tool = PrefabRecommendTool;
        let outcome = tool
            .call(serde_json::json!({"query": "speech-to-text"}), &disabled_ctx())
            .await
            .unwrap();
        assert_eq!(outcome.content["success"], false);
        assert_eq!(outcome.content["suggestion"], "use search_prefabs");
    }
}
