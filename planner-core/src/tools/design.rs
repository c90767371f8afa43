//! `design` (spec §4.3 table): `user_requirements`, optional plan/prefabs/
//! research → a `design.md` document string. Also appends a companion
//! `prefabs_info.md` built from prefab function detail lookups whenever
//! prefab recommendations exist for the turn (SPEC_FULL §10 "design tool's
//! two-document emission").
//!
//! The one tool built as a [`crate::node::flow::Flow`] over two
//! [`crate::node::Node`]s rather than a single `Tool::call` body (spec §4.6
//! "Design pattern"): `design` produces `design.md`, then hands off to
//! `prefab_detail`, which appends `prefabs_info.md` when there is anything to
//! report.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::PrefabMatch;
use crate::error::AgentError;
use crate::llm::{ChatRequest, LlmClient};
use crate::message::Message;
use crate::node::flow::Flow;
use crate::node::{Action, Node};
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct DesignTool;

const SYSTEM_PROMPT: &str = "You are the design stage of a software design assistant. \
Produce a complete design.md covering architecture, components, data flow, and key decisions.";

/// Working state threaded through the `design` → `prefab_detail` flow. Owned
/// copies of everything the nodes need, so the flow has no borrow on the
/// dispatching [`ToolContext`] (spec §4.6 nodes "may add keys freely").
struct DesignFlowState {
    user_requirements: String,
    prior_plan: Option<String>,
    prefabs: Vec<PrefabMatch>,
    research: Option<String>,
    llm: Arc<dyn LlmClient>,
    now: f64,
    design_md: Option<String>,
    prefabs_info_md: Option<String>,
}

struct DesignDocNode;

#[async_trait]
impl Node<DesignFlowState> for DesignDocNode {
    type Prep = String;
    type Exec = String;

    fn id(&self) -> &str {
        "design"
    }

    async fn prep(&self, shared: &DesignFlowState) -> Result<Self::Prep, AgentError> {
        let mut prompt = format!("User requirements:\n{}\n", shared.user_requirements);
        if let Some(plan) = &shared.prior_plan {
            prompt.push_str(&format!("\nProject plan:\n{plan}\n"));
        }
        if !shared.prefabs.is_empty() {
            let names: Vec<&str> = shared.prefabs.iter().map(|p| p.name.as_str()).collect();
            prompt.push_str(&format!("\nRecommended prefabs: {}\n", names.join(", ")));
        }
        if let Some(research) = &shared.research {
            prompt.push_str(&format!("\nResearch findings:\n{research}\n"));
        }
        Ok(prompt)
    }

    async fn exec(&self, prep_result: &Self::Prep) -> Result<Self::Exec, AgentError> {
        Ok(prep_result.clone())
    }

    async fn post(
        &self,
        shared: &mut DesignFlowState,
        _prep_result: &Self::Prep,
        exec_result: Self::Exec,
    ) -> Result<Action, AgentError> {
        let request = ChatRequest::new(vec![Message::user(exec_result, shared.now)]).with_system_prompt(SYSTEM_PROMPT);
        let response = shared.llm.chat_completion(request).await?;
        shared.design_md = Some(response.content);
        if shared.prefabs.is_empty() {
            Ok(Action::Terminal)
        } else {
            Ok(Action::named("has_prefabs"))
        }
    }
}

struct PrefabDetailNode;

#[async_trait]
impl Node<DesignFlowState> for PrefabDetailNode {
    type Prep = ();
    type Exec = String;

    fn id(&self) -> &str {
        "prefab_detail"
    }

    async fn prep(&self, _shared: &DesignFlowState) -> Result<Self::Prep, AgentError> {
        Ok(())
    }

    async fn exec(&self, _prep_result: &Self::Prep) -> Result<Self::Exec, AgentError> {
        Ok(String::new())
    }

    async fn post(
        &self,
        shared: &mut DesignFlowState,
        _prep_result: &Self::Prep,
        _exec_result: Self::Exec,
    ) -> Result<Action, AgentError> {
        let mut doc = String::from("# Prefab Function Details\n\n");
        for prefab in &shared.prefabs {
            doc.push_str(&format!(
                "## {} ({} v{})\n\n{}\n\nTags: {}\n\n",
                prefab.name,
                prefab.id,
                prefab.version,
                prefab.description,
                prefab.tags.join(", ")
            ));
        }
        shared.prefabs_info_md = Some(doc);
        Ok(Action::Terminal)
    }
}

#[async_trait]
impl Tool for DesignTool {
    fn name(&self) -> &str {
        "design"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "design".into(),
            description: "Produce a design.md from the user's requirements, plan, prefabs, and research; appends prefabs_info.md when prefabs were recommended.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "user_requirements": {"type": "string"},
                    "prior_plan": {"type": "string"},
                    "research": {"type": "string"},
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
            .ok_or_else(|| crate::registry::validation_error("user_requirements"))?
            .to_string();
        let prior_plan = args
            .get("prior_plan")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| ctx.short_planning.clone());
        let research = args.get("research").and_then(|v| v.as_str()).map(String::from);

        let llm = ctx
            .llm
            .clone()
            .ok_or_else(|| AgentError::Other("design requires an LLM client".into()))?;

        let mut state = DesignFlowState {
            user_requirements,
            prior_plan,
            prefabs: ctx.recommended_prefabs.clone(),
            research,
            llm,
            now: ctx.now,
            design_md: None,
            prefabs_info_md: None,
        };

        let flow = Flow::new("design")
            .add_step(Box::new(DesignDocNode))
            .add_step(Box::new(PrefabDetailNode))
            .edge("design", "has_prefabs", "prefab_detail");

        flow.run(&mut state, ctx.streaming_session.as_deref()).await?;

        let design_md = state.design_md.unwrap_or_default();
        let mut documents = vec![crate::context::GeneratedDocument {
            doc_type: "design".into(),
            filename: "design.md".into(),
            content: design_md.clone(),
            timestamp: ctx.now,
        }];
        ctx.emit(stream_event::event::ProtocolEvent::DesignDocumentGenerated {
            filename: "design.md".into(),
            content: design_md.clone(),
        })
        .await;

        if let Some(prefabs_info) = state.prefabs_info_md {
            ctx.emit(stream_event::event::ProtocolEvent::PrefabsInfo {
                content: prefabs_info.clone(),
            })
            .await;
            documents.push(crate::context::GeneratedDocument {
                doc_type: "prefabs_info".into(),
                filename: "prefabs_info.md".into(),
                content: prefabs_info,
                timestamp: ctx.now,
            });
        }

        Ok(ToolOutcome::with_update(
            serde_json::json!({
                "generation_success": !design_md.is_empty(),
                "filenames": documents.iter().map(|d| d.filename.clone()).collect::<Vec<_>>(),
            }),
            ResultUpdate::GeneratedDocuments(documents),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmClient;
    use crate::llm::LlmResponse;
    use std::collections::HashMap;

    fn ctx_with_mock(reply: &str, prefabs: Vec<PrefabMatch>) -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: prefabs,
            generated_documents: vec![],
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("DESIGN_TEST_")),
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
    async fn without_prefabs_emits_only_design_md() {
        let tool = DesignTool;
        let ctx = ctx_with_mock("# Design\n...", vec![]);
        let outcome = tool
            .call(serde_json::json!({"user_requirements": "a todo app"}), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.content["generation_success"], true);
        let filenames = outcome.content["filenames"].as_array().unwrap();
        assert_eq!(filenames.len(), 1);
        assert_eq!(filenames[0], "design.md");
    }

    #[tokio::test]
    async fn with_prefabs_also_emits_prefabs_info_md() {
        let tool = DesignTool;
        let prefab = PrefabMatch {
            id: "pdf-extractor".into(),
            version: "2.0.1".into(),
            name: "PDF Extractor".into(),
            description: "Extracts PDF text".into(),
            score: 0.9,
            tags: vec!["pdf".into()],
        };
        let ctx = ctx_with_mock("# Design\n...", vec![prefab]);
        let outcome = tool
            .call(serde_json::json!({"user_requirements": "a todo app"}), &ctx)
            .await
            .unwrap();
        let filenames = outcome.content["filenames"].as_array().unwrap();
        assert_eq!(filenames.len(), 2);
        assert!(filenames.contains(&serde_json::json!("prefabs_info.md")));
    }

    #[tokio::test]
    async fn missing_requirements_is_validation_error() {
        let tool = DesignTool;
        let ctx = ctx_with_mock("ignored", vec![]);
        let err = tool.call(serde_json::json!({}), &ctx).await;
        assert!(err.is_err());
    }
}
