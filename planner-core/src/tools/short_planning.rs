//! `short_planning` (spec §4.3 table): `user_requirements`, optional prior
//! plan, improvement points, prefabs, research → a step-by-step project plan
//! as Markdown. Re-callable to refine an existing plan (SPEC_FULL §10
//! "short_planning refinement shape").

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::llm::ChatRequest;
use crate::message::Message;
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct ShortPlanningTool;

const SYSTEM_PROMPT: &str = "You are the planning stage of a software design assistant. \
Produce a step-by-step project plan as Markdown with numbered sections. \
Keep section numbering stable across revisions.";

#[async_trait]
impl Tool for ShortPlanningTool {
    fn name(&self) -> &str {
        "short_planning"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "short_planning".into(),
            description: "Produce (or refine) a step-by-step Markdown project plan from the user's requirements.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "user_requirements": {"type": "string"},
                    "prior_plan": {"type": "string"},
                    "improvement_points": {"type": "array", "items": {"type": "string"}},
                    "prefabs": {"type": "array", "items": {"type": "string"}},
                    "research": {"type": "string"},
                },
                "required": ["user_requirements"],
            }),
            required: vec!["user_requirements".into()],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        let requirements = args
            .get("user_requirements")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("user_requirements"))?;
        let prior_plan = args.get("prior_plan").and_then(|v| v.as_str());
        let improvement_points: Vec<String> = args
            .get("improvement_points")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let prefabs = args.get("prefabs").and_then(|v| v.as_array());
        let research = args.get("research").and_then(|v| v.as_str());

        let llm = ctx
            .llm
            .as_ref()
            .ok_or_else(|| AgentError::Other("short_planning requires an LLM client".into()))?;

        let is_revision = prior_plan.is_some() && !improvement_points.is_empty();

        let mut prompt = format!("User requirements:\n{requirements}\n");
        if let Some(prefabs) = prefabs {
            prompt.push_str(&format!("\nRecommended prefabs:\n{prefabs}\n"));
        }
        if let Some(research) = research {
            prompt.push_str(&format!("\nResearch findings:\n{research}\n"));
        }
        if is_revision {
            prompt.push_str(&format!(
                "\nPrior plan:\n{}\n\nImprovement points to address (keep section numbering stable, \
                 append a short \"Changes from previous plan\" note at the end):\n- {}\n",
                prior_plan.unwrap_or_default(),
                improvement_points.join("\n- ")
            ));
        }

        let request = ChatRequest::new(vec![Message::user(prompt, ctx.now)]).with_system_prompt(SYSTEM_PROMPT);
        let response = llm.chat_completion(request).await?;

        Ok(ToolOutcome::with_update(
            serde_json::json!({
                "success": true,
                "plan": response.content.clone(),
                "is_revision": is_revision,
            }),
            ResultUpdate::ShortPlanning(response.content),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmClient;
    use crate::llm::LlmResponse;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx_with_mock(reply: &str) -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: vec![],
            generated_documents: vec![],
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("PLANNING_TEST_")),
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
    async fn produces_plan_from_mock_llm() {
        let tool = ShortPlanningTool;
        let ctx = ctx_with_mock("## 1. Overview\n## 2. Steps");
        let outcome = tool
            .call(serde_json::json!({"user_requirements": "a todo app"}), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.content["success"], true);
        assert!(outcome.content["plan"].as_str().unwrap().contains("Overview"));
        assert_eq!(outcome.content["is_revision"], false);
    }

    #[tokio::test]
    async fn missing_requirements_is_validation_error() {
        let tool = ShortPlanningTool;
        let ctx = ctx_with_mock("plan");
        let err = tool.call(serde_json::json!({}), &ctx).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn revision_flag_set_when_prior_plan_and_points_present() {
        let tool = ShortPlanningTool;
        let ctx = ctx_with_mock("## 1. Overview (revised)");
        let args = serde_json::json!({
            "user_requirements": "a todo app",
            "prior_plan": "## 1. Overview",
            "improvement_points": ["add auth"],
        });
        let outcome = tool.call(args, &ctx).await.unwrap();
        assert_eq!(outcome.content["is_revision"], true);
    }
}
