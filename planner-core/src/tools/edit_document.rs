//! `edit_document` (spec §4.3 table, §6 "Document-edit-proposal event
//! payload"): proposes search/replace edits against a previously generated
//! document. Every edit's `search` must appear verbatim in the target
//! document (Testable Property 7) — the tool validates this itself rather
//! than deferring to the orchestrator, since it is the only place that holds
//! both the proposal and the document at once.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::context::{EditOp, PendingEdit};
use crate::error::AgentError;
use crate::registry::{ResultUpdate, Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct EditDocumentTool;

#[async_trait]
impl Tool for EditDocumentTool {
    fn name(&self) -> &str {
        "edit_document"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "edit_document".into(),
            description: "Propose search/replace edits against a previously generated document (design or database_design); every edit's search text must appear verbatim in the document.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "document_type": {"type": "string", "enum": ["design", "database_design"]},
                    "document_filename": {"type": "string"},
                    "edits": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "search": {"type": "string"},
                                "replace": {"type": "string"},
                                "reason": {"type": "string"},
                            },
                            "required": ["search", "replace", "reason"],
                        },
                    },
                    "summary": {"type": "string"},
                },
                "required": ["document_type", "document_filename", "edits", "summary"],
            }),
            required: vec![
                "document_type".into(),
                "document_filename".into(),
                "edits".into(),
                "summary".into(),
            ],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        let document_type = args
            .get("document_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("document_type"))?;
        let document_filename = args
            .get("document_filename")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("document_filename"))?;
        let summary = args
            .get("summary")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("summary"))?;
        let raw_edits = args
            .get("edits")
            .and_then(|v| v.as_array())
            .ok_or_else(|| crate::registry::validation_error("edits"))?;

        let document = ctx
            .latest_document(document_filename)
            .ok_or_else(|| AgentError::Validation(format!("no generated document named '{document_filename}'")))?;

        let mut edits = Vec::with_capacity(raw_edits.len());
        for (i, raw) in raw_edits.iter().enumerate() {
            let search = raw
                .get("search")
                .and_then(|v| v.as_str())
                .ok_or_else(|| crate::registry::validation_error(&format!("edits[{i}].search")))?;
            let replace = raw
                .get("replace")
                .and_then(|v| v.as_str())
                .ok_or_else(|| crate::registry::validation_error(&format!("edits[{i}].replace")))?;
            let reason = raw
                .get("reason")
                .and_then(|v| v.as_str())
                .ok_or_else(|| crate::registry::validation_error(&format!("edits[{i}].reason")))?;

            if !document.content.contains(search) {
                return Err(AgentError::Validation(format!(
                    "edits[{i}].search does not appear verbatim in '{document_filename}'"
                )));
            }

            edits.push(EditOp {
                search: search.to_string(),
                replace: replace.to_string(),
                reason: reason.to_string(),
            });
        }

        let preview_content = edits.iter().fold(document.content.clone(), |acc, edit| {
            acc.replacen(&edit.search, &edit.replace, 1)
        });

        let proposal_id = Uuid::new_v4().to_string();
        let pending = PendingEdit {
            proposal_id: proposal_id.clone(),
            document_type: document_type.to_string(),
            document_filename: document_filename.to_string(),
            edits: edits.clone(),
            summary: summary.to_string(),
            preview_content: Some(preview_content.clone()),
        };

        ctx.emit(stream_event::event::ProtocolEvent::DocumentEditProposal {
            proposal_id: proposal_id.clone(),
            document_type: document_type.to_string(),
            document_filename: document_filename.to_string(),
            edits: edits
                .iter()
                .map(|e| stream_event::event::EditEntry {
                    search: e.search.clone(),
                    replace: e.replace.clone(),
                    reason: e.reason.clone(),
                })
                .collect(),
            summary: summary.to_string(),
            preview_content: Some(preview_content.clone()),
        })
        .await;

        Ok(ToolOutcome::with_update(
            serde_json::json!({
                "success": true,
                "proposal_id": proposal_id,
                "edit_count": edits.len(),
                "preview_content": preview_content,
            }),
            ResultUpdate::PendingEdit(pending),
        ))
    }
}
