//! `export_document` (spec §4.3 table, §6 "Export output layout"): converts
//! one or more generated Markdown documents to the requested formats and
//! writes them under `output_dir`. `md` is pass-through, `html` wraps a
//! converted document in a minimal self-contained page with Mermaid
//! rendering hooks, `txt` strips Markdown syntax down to plain text. `pdf`
//! and `docx` are declared in the schema but always fail as not implemented.

use async_trait::async_trait;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde_json::Value;

use crate::error::AgentError;
use crate::registry::{Tool, ToolContext, ToolOutcome, ToolSpec};

pub struct ExportDocumentTool;

const HTML_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; line-height: 1.6; }
pre, code { background: #f4f4f4; border-radius: 4px; }
pre { padding: 1rem; overflow-x: auto; }
</style>
<script src="https://cdn.jsdelivr.net/npm/mermaid/dist/mermaid.min.js"></script>
<script>mermaid.initialize({ startOnLoad: true });</script>
</head>
<body>
{body}
</body>
</html>
"#;

#[async_trait]
impl Tool for ExportDocumentTool {
    fn name(&self) -> &str {
        "export_document"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "export_document".into(),
            description: "Export generated documents (design, database_design, or all) to md/html/txt files under output_dir. pdf/docx are declared but not implemented.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "document_type": {"type": "string", "enum": ["design", "database_design", "all"]},
                    "export_formats": {"type": "array", "items": {"type": "string", "enum": ["md", "html", "txt", "pdf", "docx"]}},
                    "output_dir": {"type": "string"},
                },
                "required": ["document_type", "export_formats", "output_dir"],
            }),
            required: vec!["document_type".into(), "export_formats".into(), "output_dir".into()],
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, AgentError> {
        let document_type = args
            .get("document_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("document_type"))?;
        let formats: Vec<String> = args
            .get("export_formats")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .filter(|v: &Vec<String>| !v.is_empty())
            .ok_or_else(|| crate::registry::validation_error("export_formats"))?;
        let output_dir = args
            .get("output_dir")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::registry::validation_error("output_dir"))?;

        let candidate_filenames: Vec<&str> = match document_type {
            "design" => vec!["design.md"],
            "database_design" => vec!["database_design.md"],
            "all" => vec!["design.md", "database_design.md", "prefabs_info.md"],
            other => return Err(AgentError::Validation(format!("unknown document_type '{other}'"))),
        };

        let documents: Vec<_> = candidate_filenames
            .into_iter()
            .filter_map(|name| ctx.latest_document(name))
            .collect();

        if documents.is_empty() {
            return Ok(ToolOutcome::new(serde_json::json!({
                "success": false,
                "error": "no generated documents available to export",
            })));
        }

        std::fs::create_dir_all(output_dir)
            .map_err(|e| AgentError::Other(format!("failed to create output_dir '{output_dir}': {e}")))?;

        let timestamp = format_timestamp(ctx.now);
        let mut saved = Vec::new();
        let mut failed = Vec::new();

        for document in &documents {
            let basename = document.filename.trim_end_matches(".md");
            for fmt in &formats {
                match fmt.as_str() {
                    "md" | "html" | "txt" => {
                        let content = match fmt.as_str() {
                            "md" => document.content.clone(),
                            "html" => render_html(basename, &document.content),
                            "txt" => strip_markdown(&document.content),
                            _ => unreachable!(),
                        };
                        let path = format!("{}/{}_{}_{}.{}", output_dir.trim_end_matches('/'), basename, fmt, timestamp, fmt);
                        std::fs::write(&path, content)
                            .map_err(|e| AgentError::Other(format!("failed to write '{path}': {e}")))?;
                        saved.push(path);
                    }
                    "pdf" | "docx" => {
                        failed.push(serde_json::json!({
                            "filename": document.filename,
                            "format": fmt,
                            "error": "not implemented",
                        }));
                    }
                    other => {
                        failed.push(serde_json::json!({
                            "filename": document.filename,
                            "format": other,
                            "error": "unsupported format",
                        }));
                    }
                }
            }
        }

        Ok(ToolOutcome::new(serde_json::json!({
            "success": !saved.is_empty(),
            "saved_files": saved,
            "failed": failed,
        })))
    }
}

fn format_timestamp(epoch_secs: f64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs as i64, 0)
        .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).expect("epoch zero is valid"))
        .format("%Y%m%d_%H%M%S")
        .to_string()
}

fn render_html(title: &str, markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut body = String::new();
    pulldown_cmark::html::push_html(&mut body, parser);
    HTML_TEMPLATE.replace("{title}", title).replace("{body}", &body)
}

/// Strips Markdown syntax down to plain text by keeping only `Text`/`Code`
/// events and inserting blank lines at block boundaries.
fn strip_markdown(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut out = String::new();
    for event in parser {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => out.push_str("\n\n"),
            Event::Start(Tag::Item) => out.push_str("- "),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GeneratedDocument;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx_with_doc(output_root: &std::path::Path) -> (ToolContext, String) {
        let out_dir = output_root.join("export-test");
        let ctx = ToolContext {
            session_id: "s".into(),
            language: "en".into(),
            dialogue_history: vec![],
            recommended_prefabs: vec![],
            generated_documents: vec![GeneratedDocument {
                doc_type: "design".into(),
                filename: "design.md".into(),
                content: "# Title\n\nSome **bold** text.".into(),
                timestamp: 1.0,
            }],
            pending_document_edits: HashMap::new(),
            short_planning: None,
            config: Arc::new(config::PlannerConfig::from_env("EXPORT_TEST_")),
            llm: None,
            http: reqwest::Client::new(),
            streaming_session: None,
            now: 1_700_000_000.0,
        };
        (ctx, out_dir.to_string_lossy().to_string())
    }

    #[tokio::test]
    async fn exports_md_and_html_and_cleans_up() {
        let tmp = std::env::temp_dir().join(format!("planner-core-export-test-{}", std::process::id()));
        let (ctx, out_dir) = ctx_with_doc(&tmp);
        let tool = ExportDocumentTool;
        let args = serde_json::json!({
            "document_type": "design",
            "export_formats": ["md", "html"],
            "output_dir": out_dir,
        });
        let outcome = tool.call(args, &ctx).await.unwrap();
        assert_eq!(outcome.content["success"], true);
        let saved = outcome.content["saved_files"].as_array().unwrap();
        assert_eq!(saved.len(), 2);
        std::fs::remove_dir_all(&out_dir).ok();
    }

    #[tokio::test]
    async fn pdf_format_is_reported_as_not_implemented() {
        let tmp = std::env::temp_dir().join(format!("planner-core-export-test-pdf-{}", std::process::id()));
        let (ctx, out_dir) = ctx_with_doc(&tmp);
        let tool = ExportDocumentTool;
        let args = serde_json::json!({
            "document_type": "design",
            "export_formats": ["pdf"],
            "output_dir": out_dir,
        });
        let outcome = tool.call(args, &ctx).await.unwrap();
        let failed = outcome.content["failed"].as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["error"], "not implemented");
        std::fs::remove_dir_all(&out_dir).ok();
    }

    #[test]
    fn strip_markdown_removes_formatting() {
        let text = strip_markdown("# Title\n\nSome **bold** text.");
        assert!(!text.contains('#'));
        assert!(!text.contains("**"));
        assert!(text.contains("Title"));
        assert!(text.contains("bold"));
    }
}
