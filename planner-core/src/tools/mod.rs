//! The tool catalogue (spec §4.3 "Tool catalogue"): one module per tool,
//! each a self-contained [`crate::registry::Tool`] implementation.
//!
//! Grounded on `loom/src/tools/file/*.rs`'s one-file-per-tool layout. Simple
//! tools (`search_prefabs`, `view_document`, ...) implement `Tool::call`
//! directly; `design` is the one tool that needs multi-step orchestration and
//! is built as a [`crate::node::flow::Flow`] over two [`crate::node::Node`]s,
//! per spec §4.6's "Design pattern".

pub mod call_prefab_function;
pub mod database_design;
pub mod design;
pub mod edit_document;
pub mod export_document;
pub mod prefab_catalog;
pub mod prefab_recommend;
pub mod research;
pub mod search_prefabs;
pub mod short_planning;
pub mod view_document;

use std::sync::Arc;

use crate::registry::{Tool, ToolRegistry};

/// Registers every tool in the catalogue into `registry` (spec §4.3's static
/// table, assembled once at startup by the host).
pub fn register_all(registry: &mut ToolRegistry) {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(prefab_recommend::PrefabRecommendTool::default()),
        Arc::new(search_prefabs::SearchPrefabsTool::default()),
        Arc::new(research::ResearchTool),
        Arc::new(short_planning::ShortPlanningTool),
        Arc::new(design::DesignTool),
        Arc::new(database_design::DatabaseDesignTool),
        Arc::new(edit_document::EditDocumentTool),
        Arc::new(view_document::ViewDocumentTool),
        Arc::new(export_document::ExportDocumentTool),
        Arc::new(call_prefab_function::CallPrefabFunctionTool),
    ];
    for tool in tools {
        registry.register(tool);
    }
}

/// Truncates `s` to `max_chars`, appending a `"... [truncated, N chars
/// total]"` marker (SPEC_FULL §10 "Prefab function call result truncation";
/// pinned threshold/format).
pub fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{head}... [truncated, {} chars total]", s.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_untouched() {
        assert_eq!(truncate_with_marker("short", 2000), "short");
    }

    #[test]
    fn truncate_marks_long_strings() {
        let long = "a".repeat(2500);
        let truncated = truncate_with_marker(&long, 2000);
        assert!(truncated.starts_with(&"a".repeat(2000)));
        assert!(truncated.ends_with("... [truncated, 2500 chars total]"));
    }
}
