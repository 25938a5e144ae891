//! SSE line framing for chat completion chunks.

use crate::chunk::ChatCompletionChunk;

/// Sentinel line OpenAI-compatible clients expect after the last data line.
pub const DONE_LINE: &str = "data: [DONE]\n\n";

/// Serializes a [`ChatCompletionChunk`] to a single SSE line: `data: <JSON>\n\n`.
pub fn write_sse_line(chunk: &ChatCompletionChunk) -> String {
    let json = serde_json::to_string(chunk).expect("chunk serialization is infallible");
    format!("data: {json}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkChoice, Delta};

    #[test]
    fn write_sse_line_wraps_json_in_data_prefix() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-1".into(),
            object: ChatCompletionChunk::OBJECT,
            created: 0,
            model: "gpt-4o-mini".into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    role: Some("assistant".into()),
                    content: Some("hi".into()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            usage: None,
        };
        let line = write_sse_line(&chunk);
        assert!(line.starts_with("data: "));
        assert!(line.ends_with("\n\n"));
    }
}
