//! Scans raw text deltas for inline `<tool_call>...</tool_call>` markers
//! (emitted by providers, notably the CLI adapter, that signal tool use as
//! text rather than a structured field) and splits them back out into plain
//! text and parsed tool calls.
//!
//! Boundary-safe: a delta can split a tag across two chunks, so plain text
//! is only released once it's known not to be the prefix of an opening tag.

const OPEN_TAG: &str = "<tool_call>";
const CLOSE_TAG: &str = "</tool_call>";

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutput {
    Text(String),
    ToolCall { name: String, arguments: String },
}

#[derive(Default)]
pub struct ToolCallScanner {
    buffer: String,
    in_tag: bool,
}

impl ToolCallScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) -> Vec<ScanOutput> {
        self.buffer.push_str(delta);
        let mut outputs = Vec::new();

        loop {
            if self.in_tag {
                match self.buffer.find(CLOSE_TAG) {
                    Some(end) => {
                        let body: String = self.buffer.drain(..end).collect();
                        self.buffer.drain(..CLOSE_TAG.len());
                        self.in_tag = false;
                        if let Some((name, arguments)) = parse_tool_call_body(&body) {
                            outputs.push(ScanOutput::ToolCall { name, arguments });
                        }
                    }
                    None => break,
                }
            } else {
                match self.buffer.find(OPEN_TAG) {
                    Some(start) => {
                        if start > 0 {
                            let text: String = self.buffer.drain(..start).collect();
                            outputs.push(ScanOutput::Text(text));
                        }
                        self.buffer.drain(..OPEN_TAG.len());
                        self.in_tag = true;
                    }
                    None => {
                        let safe_len = self.buffer.len().saturating_sub(OPEN_TAG.len() - 1);
                        if safe_len > 0 {
                            let text: String = self.buffer.drain(..safe_len).collect();
                            outputs.push(ScanOutput::Text(text));
                        }
                        break;
                    }
                }
            }
        }

        outputs
    }

    /// Releases whatever is left in the buffer at stream end. A dangling,
    /// never-closed tag is surfaced as plain text rather than dropped.
    pub fn flush(&mut self) -> Option<ScanOutput> {
        if self.buffer.is_empty() {
            return None;
        }
        let remainder = std::mem::take(&mut self.buffer);
        if self.in_tag {
            Some(ScanOutput::Text(format!("{OPEN_TAG}{remainder}")))
        } else {
            Some(ScanOutput::Text(remainder))
        }
    }
}

fn parse_tool_call_body(body: &str) -> Option<(String, String)> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    let name = value.get("name")?.as_str()?.to_string();
    let arguments = value
        .get("arguments")
        .map(|a| a.to_string())
        .unwrap_or_else(|| "{}".to_string());
    Some((name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_with_no_tags_passes_through() {
        let mut scanner = ToolCallScanner::new();
        let outputs = scanner.push("hello world");
        assert_eq!(outputs, vec![ScanOutput::Text("hello world".into())]);
    }

    #[test]
    fn a_complete_tool_call_in_one_chunk_is_parsed() {
        let mut scanner = ToolCallScanner::new();
        let chunk = r#"before <tool_call>{"name":"search","arguments":{"q":"rust"}}</tool_call> after"#;
        let outputs = scanner.push(chunk);
        assert_eq!(outputs[0], ScanOutput::Text("before ".into()));
        assert_eq!(
            outputs[1],
            ScanOutput::ToolCall {
                name: "search".into(),
                arguments: r#"{"q":"rust"}"#.into(),
            }
        );
        assert_eq!(outputs[2], ScanOutput::Text(" after".into()));
    }

    #[test]
    fn a_tag_split_across_chunks_is_still_detected() {
        let mut scanner = ToolCallScanner::new();
        let first = scanner.push("here comes <tool_c");
        let second = scanner.push(r#"all>{"name":"x","arguments":{}}</tool_call>done"#);
        assert!(first.iter().all(|o| matches!(o, ScanOutput::Text(_))));
        assert!(second.iter().any(|o| matches!(o, ScanOutput::ToolCall { .. })));
    }

    #[test]
    fn flush_releases_a_never_closed_dangling_tag_as_text() {
        let mut scanner = ToolCallScanner::new();
        scanner.push("partial <tool_call>{\"name\":\"x\"");
        let flushed = scanner.flush().unwrap();
        assert!(matches!(flushed, ScanOutput::Text(_)));
    }
}
