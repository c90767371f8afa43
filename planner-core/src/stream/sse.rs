//! SSE handler: serializes events as `event: <kind>\ndata: <json>\n\n` frames to a
//! caller-provided async writer.
//!
//! Grounded on [`super::terminal::TerminalHandler`]'s "any `AsyncWrite` sink" shape,
//! generalized with a heartbeat task (writes a synthetic `heartbeat` frame when no
//! event has gone out for `heartbeat_interval`) and optional chunk buffering so
//! many small `assistant_message_chunk` frames can be coalesced into fewer writes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use stream_event::event::ProtocolEvent;

use super::StreamHandler;

/// Serializes events to an SSE frame and writes them to `W`. Survives individual
/// write errors by cancelling the heartbeat task and ceasing further writes.
pub struct SseHandler<W> {
    writer: Mutex<W>,
    buffer: Mutex<Vec<String>>,
    buffer_threshold: usize,
    dead: AtomicBool,
    pending_since_flush: AtomicUsize,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> SseHandler<W> {
    /// `buffer_threshold == 1` disables buffering: every event is flushed
    /// immediately (spec's default). A higher threshold coalesces writes,
    /// flushing "when buffered count >= 5 or on demand" per §4.5.
    pub fn new(writer: W, buffer_threshold: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            buffer: Mutex::new(Vec::new()),
            buffer_threshold: buffer_threshold.max(1),
            dead: AtomicBool::new(false),
            pending_since_flush: AtomicUsize::new(0),
            heartbeat: Mutex::new(None),
        }
    }

    /// Formats one SSE frame: `event: <kind>\ndata: <json>\n\n`.
    pub fn frame(kind: &str, data: &serde_json::Value) -> String {
        format!("event: {kind}\ndata: {data}\n\n")
    }

    async fn write_raw(&self, frame: &str) {
        if self.dead.load(Ordering::SeqCst) {
            return;
        }
        let mut w = self.writer.lock().await;
        if w.write_all(frame.as_bytes()).await.is_err() || w.flush().await.is_err() {
            drop(w);
            self.kill().await;
        }
    }

    async fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
        if let Some(handle) = self.heartbeat.lock().await.take() {
            handle.abort();
        }
    }

    async fn enqueue(&self, frame: String) {
        if self.buffer_threshold <= 1 {
            self.write_raw(&frame).await;
            return;
        }
        let mut buf = self.buffer.lock().await;
        buf.push(frame);
        if buf.len() >= self.buffer_threshold {
            let frames = std::mem::take(&mut *buf);
            drop(buf);
            self.write_raw(&frames.concat()).await;
        }
    }

    /// Flushes any buffered frames immediately.
    pub async fn flush(&self) {
        let mut buf = self.buffer.lock().await;
        if buf.is_empty() {
            return;
        }
        let frames = std::mem::take(&mut *buf);
        drop(buf);
        self.write_raw(&frames.concat()).await;
    }

    /// Starts the heartbeat task: writes a `heartbeat` frame every `interval`
    /// unless cancelled via [`SseHandler::kill`] (session close or write error).
    /// `self` must already be wrapped in `Arc` so the spawned task can hold a
    /// clone.
    pub fn spawn_heartbeat(self: &Arc<Self>, interval: Duration) {
        let handler = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if handler.dead.load(Ordering::SeqCst) {
                    return;
                }
                let frame = SseHandler::<W>::frame("heartbeat", &serde_json::json!({"timestamp": now()}));
                handler.write_raw(&frame).await;
            }
        });
        // Store synchronously via try_lock: called right after construction,
        // before any concurrent access, so this never contends.
        if let Ok(mut slot) = self.heartbeat.try_lock() {
            *slot = Some(task);
        }
    }
}

fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> StreamHandler for SseHandler<W> {
    async fn handle_event(&self, event: &ProtocolEvent, envelope: &serde_json::Value) {
        // `envelope` is already the event serialized and stamped with
        // session_id/timestamp by `StreamingSession::emit`; frame it as-is
        // rather than re-serializing `event` without the envelope (spec §6
        // "`data` is... a JSON object with at least `session_id` and
        // `timestamp`").
        let frame = Self::frame(event.kind_name(), envelope);
        self.enqueue(frame).await;
    }

    async fn handle_error(&self, _error: &str) {
        self.kill().await;
    }
}
