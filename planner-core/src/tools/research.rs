//! `research` (spec §4.3 table): `keywords[]`, `focus_areas[]`,
//! `project_context?` → structured findings (keyword→summary, overall
//! summary), fetched through the Jina-style research service. Requires an
//! external research API key; otherwise returns a disabled-tool result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AgentError, ErrorKind};
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct ResearchTool;

#[derive(Deserialize)]
struct JinaFindingsResponse {
    #[serde(default)]
    findings: Vec<JinaFinding>,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct JinaFinding {
    keyword: String,
    summary: String,
}

#[async_trait]
impl Tool for ResearchTool {
    fn name(&self) -> &str {
        "research"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "research".into(),
            description: "Technical research over one or more keywords, returning a summary per keyword plus an overall synthesis.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "keywords": {"type": "array", "items": {"type": "string"}},
                    "focus_areas": {"type": "array", "items": {"type": "string"}},
                    "project_context": {"type": "string"},
                },
                "required": ["keywords"],
            }),
            required: vec!["keywords".into()],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        if !ctx.config.research_enabled() {
            return Ok(ToolOutcome::disabled("configure JINA_API_KEY to enable research"));
        }

        let keywords: Vec<String> = args
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        if keywords.is_empty() {
            return Err(crate::registry::validation_error("keywords"));
        }
        let focus_areas: Vec<String> = args
            .get("focus_areas")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let project_context = args.get("project_context").and_then(|v| v.as_str());

        let jina_key = ctx
            .config
            .jina_api_key
            .as_ref()
            .expect("checked by research_enabled");

        let response = ctx
            .http
            .post("https://s.jina.ai/research")
            .bearer_auth(jina_key)
            .timeout(ctx.config.vector_service_timeout)
            .json(&serde_json::json!({
                "keywords": keywords,
                "focus_areas": focus_areas,
                "project_context": project_context,
            }))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AgentError::Llm {
                kind: status_to_kind(status.as_u16()),
                message: format!("research service returned {status}"),
                retry_after: None,
            });
        }

        let parsed: JinaFindingsResponse = response.json().await.map_err(|e| AgentError::Llm {
            kind: ErrorKind::Unknown,
            message: format!("malformed research response: {e}"),
            retry_after: None,
        })?;

        let per_keyword: serde_json::Map<String, Value> = parsed
            .findings
            .into_iter()
            .map(|f| (f.keyword, Value::String(f.summary)))
            .collect();

        let payload = serde_json::json!({
            "success": true,
            "findings": per_keyword,
            "summary": parsed.summary,
        });

        Ok(ToolOutcome::with_update(
            payload.clone(),
            ResultUpdate::ResearchFindings(payload),
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
