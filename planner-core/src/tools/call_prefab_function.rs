//! `call_prefab_function` (spec §4.3 table): `prefab_id`, `version`,
//! `function_name`, `parameters`, optional `files` → the downstream
//! function's return value, invoked through the prefab gateway. Requires a
//! gateway base URL and an API key; large `content` strings in the result are
//! truncated per SPEC_FULL §10's pinned threshold/marker.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, ErrorKind};
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

const TRUNCATE_THRESHOLD: usize = 2000;

pub struct CallPrefabFunctionTool;

#[async_trait]
impl Tool for CallPrefabFunctionTool {
    fn name(&self) -> &str {
        "call_prefab_function"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "call_prefab_function".into(),
            description: "Invoke a function exposed by a prefab through the prefab gateway.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "prefab_id": {"type": "string"},
                    "version": {"type": "string"},
                    "function_name": {"type": "string"},
                    "parameters": {"type": "object"},
                    "files": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["prefab_id", "version", "function_name", "parameters"],
            }),
            required: vec![
                "prefab_id".into(),
                "version".into(),
                "function_name".into(),
                "parameters".into(),
            ],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        if !ctx.config.call_prefab_function_enabled() {
            return Ok(ToolOutcome::disabled(
                "configure PREFAB_GATEWAY_BASE_URL and AGENT_BUILDER_API_KEY to enable prefab function calls",
            ));
        }

        let prefab_id = args
            .get("prefab_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("prefab_id"))?;
        let version = args
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("version"))?;
        let function_name = args
            .get("function_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("function_name"))?;
        let parameters = args
            .get("parameters")
            .cloned()
            .ok_or_else(|| crate::registry::validation_error("parameters"))?;
        let files = args.get("files").cloned().unwrap_or(Value::Array(vec![]));

        let base_url = ctx.config.prefab_gateway_base_url.as_ref().expect("checked above");
        let api_key = ctx.config.agent_builder_api_key.as_ref().expect("checked above");
        let url = format!("{}/prefabs/{}/{}/functions/{}", base_url.trim_end_matches('/'), prefab_id, version, function_name);

        let response = ctx
            .http
            .post(&url)
            .bearer_auth(api_key)
            .timeout(ctx.config.prefab_gateway_timeout)
            .json(&serde_json::json!({"parameters": parameters, "files": files}))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AgentError::Llm {
                kind: status_to_kind(status.as_u16()),
                message: format!("prefab gateway returned {status}"),
                retry_after: None,
            });
        }

        let mut result: Value = response.json().await.map_err(|e| AgentError::Llm {
            kind: ErrorKind::Unknown,
            message: format!("malformed prefab gateway response: {e}"),
            retry_after: None,
        })?;

        truncate_string_fields(&mut result);

        Ok(ToolOutcome::with_update(
            serde_json::json!({
                "success": true,
                "result": result,
            }),
            ResultUpdate::None,
        ))
    }
}

/// Truncates every string value in-place (including nested object/array
/// values) over [`TRUNCATE_THRESHOLD`] chars, per SPEC_FULL §10's pinned
/// threshold and marker format.
fn truncate_string_fields(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.chars().count() > TRUNCATE_THRESHOLD {
                *s = super::truncate_with_marker(s, TRUNCATE_THRESHOLD);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(truncate_string_fields),
        Value::Object(map) => map.values_mut().for_each(truncate_string_fields),
        _ => {}
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
