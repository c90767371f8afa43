//! Terminal handler: human-readable console rendering of stream events.
//! Grounded on the teacher's CLI event printing conventions
//! (icons per lifecycle event, inline chunk printing) generalized to this
//! event set, plus a file-saving side effect for generated documents.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use stream_event::event::ProtocolEvent;

use super::StreamHandler;

/// Renders events to any `AsyncWrite` sink (normally stdout) and saves
/// generated documents under `output_dir` with a timestamped suffix
/// (`_YYYYMMDD_HHMMSS`) inserted before the extension.
pub struct TerminalHandler<W> {
    writer: Mutex<W>,
    output_dir: Option<PathBuf>,
}

impl<W: AsyncWrite + Unpin + Send> TerminalHandler<W> {
    pub fn new(writer: W, output_dir: Option<PathBuf>) -> Self {
        Self {
            writer: Mutex::new(writer),
            output_dir,
        }
    }

    async fn write_line(&self, line: &str) {
        let mut w = self.writer.lock().await;
        let _ = w.write_all(line.as_bytes()).await;
        let _ = w.write_all(b"\n").await;
    }

    async fn write_inline(&self, text: &str) {
        let mut w = self.writer.lock().await;
        let _ = w.write_all(text.as_bytes()).await;
    }

    async fn save_document(&self, filename: &str, content: &str) {
        let Some(dir) = &self.output_dir else {
            return;
        };
        let stamped = stamp_filename(filename);
        let path = dir.join(stamped);
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Ok(mut file) = tokio::fs::File::create(&path).await {
            let _ = file.write_all(content.as_bytes()).await;
        }
    }
}

/// Inserts `_YYYYMMDD_HHMMSS` before the file extension, using the current
/// wall-clock time (mirrors the teacher's collision-avoidance convention for
/// saved artifacts).
pub fn stamp_filename(filename: &str) -> String {
    let now = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{now}.{ext}"),
        None => format!("{filename}_{now}"),
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> StreamHandler for TerminalHandler<W> {
    async fn handle_event(&self, event: &ProtocolEvent, _envelope: &serde_json::Value) {
        match event {
            ProtocolEvent::ConversationStart => self.write_line("--- conversation start ---").await,
            ProtocolEvent::ConversationEnd => self.write_line("--- conversation end ---").await,
            ProtocolEvent::AssistantMessageStart => {}
            ProtocolEvent::AssistantMessageChunk { content } => self.write_inline(content).await,
            ProtocolEvent::AssistantMessageEnd { tool_call_count, .. } => {
                self.write_line(&format!("\n[assistant done, {tool_call_count} tool call(s)]")).await;
            }
            ProtocolEvent::ToolCallStart { name, call_id, .. } => {
                self.write_line(&format!("🔧 {name} ({call_id}) started")).await;
            }
            ProtocolEvent::ToolCallProgress { call_id, summary } => {
                self.write_line(&format!("   … {call_id}: {summary}")).await;
            }
            ProtocolEvent::ToolCallEnd { name, call_id, success, duration_ms } => {
                let icon = if *success { "✅" } else { "❌" };
                self.write_line(&format!("{icon} {name} ({call_id}) finished in {duration_ms}ms")).await;
            }
            ProtocolEvent::ProcessingStatus { stage, detail } => {
                let detail = detail.clone().unwrap_or_default();
                self.write_line(&format!("… {stage} {detail}")).await;
            }
            ProtocolEvent::Error { kind, message, .. } => {
                self.write_line(&format!("error [{kind}]: {message}")).await;
            }
            ProtocolEvent::DesignDocumentGenerated { filename, content } => {
                self.write_line(&format!("📄 generated {filename}")).await;
                self.save_document(filename, content).await;
            }
            ProtocolEvent::PrefabsInfo { content } => {
                self.write_line("📦 prefabs info").await;
                self.save_document("prefabs_info.md", content).await;
            }
            ProtocolEvent::DocumentEditProposal { document_filename, edits, summary, .. } => {
                self.write_line(&format!(
                    "✏️  edit proposal for {document_filename}: {summary} ({} edit(s))",
                    edits.len()
                ))
                .await;
            }
            ProtocolEvent::Heartbeat => {}
        }
    }
}

/// Wraps a handler so it can be shared across an `Arc<dyn StreamHandler>`
/// registration without the caller needing to box it manually.
pub fn arc<W: AsyncWrite + Unpin + Send + 'static>(handler: TerminalHandler<W>) -> Arc<dyn StreamHandler> {
    Arc::new(handler)
}
