//! Inline `<tool_call>...</tool_call>` tag filter.
//!
//! A character-level state machine, not a regex: tag boundaries can cross
//! chunk boundaries, so the filter must carry state between `process_chunk`
//! calls. Feed it the model's raw output chunk by chunk; it returns the
//! user-visible text with any well-formed tag spans stripped, plus any
//! tool calls synthesized from those spans. Call `finalize` once the stream
//! ends to flush or discard whatever is left in the buffer.

use serde_json::Value;

const START_TAG: &str = "<tool_call>";
const END_TAG: &str = "</tool_call>";

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Normal,
    CollectingStartTag,
    InToolCall,
    CollectingEndTag,
}

/// One tool call recovered from an inline `<tool_call>...</tool_call>` span.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesizedToolCall {
    pub id: String,
    pub name: String,
    /// Arguments re-encoded as a JSON string (matches `FunctionCall::arguments`'s shape).
    pub arguments: String,
}

/// Output of processing one chunk: visible text plus any tool calls found.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOutput {
    pub text: String,
    pub tool_calls: Vec<SynthesizedToolCall>,
}

pub struct TagFilter {
    state: State,
    buffer: String,
    body: String,
    id_source: Box<dyn FnMut() -> String + Send>,
}

impl std::fmt::Debug for TagFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagFilter")
            .field("state", &self.state)
            .field("buffer", &self.buffer)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl Default for TagFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TagFilter {
    /// New filter using a random 8-hex-digit id source (`"call_" + random8hex`).
    pub fn new() -> Self {
        Self::with_id_source(Box::new(random_call_id))
    }

    /// New filter with a caller-supplied id generator, for deterministic tests.
    pub fn with_id_source(id_source: Box<dyn FnMut() -> String + Send>) -> Self {
        Self {
            state: State::Normal,
            buffer: String::new(),
            body: String::new(),
            id_source,
        }
    }

    /// Processes one chunk of streamed text, returning visible output and any
    /// tool calls synthesized from spans that closed within this chunk.
    pub fn process_chunk(&mut self, chunk: &str) -> FilterOutput {
        let mut out = FilterOutput::default();
        for ch in chunk.chars() {
            self.step(ch, &mut out);
        }
        out
    }

    fn step(&mut self, ch: char, out: &mut FilterOutput) {
        match self.state {
            State::Normal => {
                if ch == '<' {
                    self.buffer.clear();
                    self.buffer.push(ch);
                    self.state = State::CollectingStartTag;
                } else {
                    out.text.push(ch);
                }
            }
            State::CollectingStartTag => {
                self.buffer.push(ch);
                if self.buffer == START_TAG {
                    self.buffer.clear();
                    self.body.clear();
                    self.state = State::InToolCall;
                } else if START_TAG.starts_with(&self.buffer) {
                    // still a valid prefix, keep collecting
                } else {
                    out.text.push_str(&self.buffer);
                    self.buffer.clear();
                    self.state = State::Normal;
                }
            }
            State::InToolCall => {
                if ch == '<' {
                    self.buffer.clear();
                    self.buffer.push(ch);
                    self.state = State::CollectingEndTag;
                } else {
                    self.body.push(ch);
                }
            }
            State::CollectingEndTag => {
                self.buffer.push(ch);
                if self.buffer == END_TAG {
                    if let Some(call) = self.parse_body() {
                        out.tool_calls.push(call);
                    }
                    self.buffer.clear();
                    self.body.clear();
                    self.state = State::Normal;
                } else if END_TAG.starts_with(&self.buffer) {
                    // still a valid prefix, keep collecting
                } else {
                    // false alarm: the buffered chars were body content, not a tag
                    self.body.push_str(&self.buffer);
                    self.buffer.clear();
                    self.state = State::InToolCall;
                }
            }
        }
    }

    fn parse_body(&mut self) -> Option<SynthesizedToolCall> {
        let value: Value = serde_json::from_str(self.body.trim()).ok()?;
        let name = value.get("name")?.as_str()?.to_string();
        let arguments = value.get("arguments")?;
        let arguments = if arguments.is_string() {
            arguments.as_str().unwrap().to_string()
        } else {
            serde_json::to_string(arguments).ok()?
        };
        Some(SynthesizedToolCall {
            id: format!("call_{}", (self.id_source)()),
            name,
            arguments,
        })
    }

    /// Flushes remaining state at end of stream. A partial start tag is
    /// literal text the model really produced (e.g. a stray `<` near EOF); a
    /// body still open inside a tool call (or a partial end tag) is discarded
    /// as malformed.
    pub fn finalize(&mut self) -> FilterOutput {
        let mut out = FilterOutput::default();
        if self.state == State::CollectingStartTag {
            out.text.push_str(&self.buffer);
        }
        self.buffer.clear();
        self.body.clear();
        self.state = State::Normal;
        out
    }
}

fn random_call_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let n: u32 = rng.gen();
    format!("{n:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_filter() -> TagFilter {
        let mut n = 0u32;
        TagFilter::with_id_source(Box::new(move || {
            n += 1;
            format!("{n:08x}")
        }))
    }

    fn process_whole(filter: &mut TagFilter, s: &str) -> (String, Vec<SynthesizedToolCall>) {
        let mut text = String::new();
        let mut calls = Vec::new();
        let out = filter.process_chunk(s);
        text.push_str(&out.text);
        calls.extend(out.tool_calls);
        let out = filter.finalize();
        text.push_str(&out.text);
        calls.extend(out.tool_calls);
        (text, calls)
    }

    #[test]
    fn passes_plain_text_through_unchanged() {
        let mut f = sequential_filter();
        let (text, calls) = process_whole(&mut f, "just some prose");
        assert_eq!(text, "just some prose");
        assert!(calls.is_empty());
    }

    #[test]
    fn strips_well_formed_tool_call_span() {
        let mut f = sequential_filter();
        let s = "Let me check <tool_call>{\"name\":\"search_prefabs\",\"arguments\":{\"query\":\"pdf\"}}</tool_call> the catalogue.";
        let (text, calls) = process_whole(&mut f, s);
        assert_eq!(text, "Let me check  the catalogue.");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_prefabs");
        let args: Value = serde_json::from_str(&calls[0].arguments).unwrap();
        assert_eq!(args["query"], "pdf");
    }

    #[test]
    fn tag_boundary_crossing_chunks_is_still_recognized() {
        let mut f = sequential_filter();
        let mut text = String::new();
        let mut calls = Vec::new();
        for chunk in ["prefix <tool_", "call>{\"name\":\"x\",\"argum", "ents\":{}}</tool_call> suffix"] {
            let out = f.process_chunk(chunk);
            text.push_str(&out.text);
            calls.extend(out.tool_calls);
        }
        let out = f.finalize();
        text.push_str(&out.text);
        calls.extend(out.tool_calls);
        assert_eq!(text, "prefix  suffix");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "x");
    }

    #[test]
    fn partial_start_tag_at_eof_is_flushed_as_literal_text() {
        let mut f = sequential_filter();
        let out = f.process_chunk("trailing <tool_ca");
        let flushed = f.finalize();
        assert_eq!(format!("{}{}", out.text, flushed.text), "trailing <tool_ca");
    }

    #[test]
    fn malformed_tag_interior_at_eof_is_discarded() {
        let mut f = sequential_filter();
        let out = f.process_chunk("before <tool_call>{\"name\":\"x\"");
        let flushed = f.finalize();
        assert_eq!(out.text, "before ");
        assert!(flushed.text.is_empty());
        assert!(flushed.tool_calls.is_empty());
    }

    #[test]
    fn non_tag_angle_bracket_passes_through() {
        let mut f = sequential_filter();
        let (text, calls) = process_whole(&mut f, "a < b and b > a");
        assert_eq!(text, "a < b and b > a");
        assert!(calls.is_empty());
    }

    #[test]
    fn two_tool_calls_in_one_stream_get_distinct_ids() {
        let mut f = sequential_filter();
        let s = "<tool_call>{\"name\":\"a\",\"arguments\":{}}</tool_call> then <tool_call>{\"name\":\"b\",\"arguments\":{}}</tool_call>";
        let (_text, calls) = process_whole(&mut f, s);
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn invalid_json_body_drops_the_call_silently() {
        let mut f = sequential_filter();
        let s = "<tool_call>not json at all</tool_call>trailing text";
        let (text, calls) = process_whole(&mut f, s);
        assert_eq!(text, "trailing text");
        assert!(calls.is_empty());
    }
}
