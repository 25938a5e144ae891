//! Stage 4: code compressor. Tidies whitespace inside each surviving fenced
//! code block and collapses blocks whose bodies are identical once
//! normalized into a back-reference, independent of the exact-text dedup
//! already applied upstream.

use std::collections::HashMap;
use std::sync::OnceLock;

use llmrelay_protocol::{ChatMessage, MessageContent};
use regex::{Captures, Regex};

fn fenced_code_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([^\n]*)\n(.*?)\n```").unwrap())
}

fn blank_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn tidy_body(body: &str) -> String {
    let rstripped: String = body.lines().map(|l| l.trim_end()).collect::<Vec<_>>().join("\n");
    blank_run().replace_all(&rstripped, "\n\n").into_owned()
}

struct BlockDedup {
    next_number: u32,
    seen: HashMap<String, u32>,
}

impl BlockDedup {
    fn new() -> Self {
        Self { next_number: 1, seen: HashMap::new() }
    }

    fn process(&mut self, caps: &Captures) -> String {
        let fence_info = &caps[1];
        let tidied = tidy_body(&caps[2]);
        if let Some(&first_number) = self.seen.get(&tidied) {
            format!("```{fence_info}\n[identical to code block #{first_number} above]\n```")
        } else {
            self.seen.insert(tidied.clone(), self.next_number);
            self.next_number += 1;
            format!("```{fence_info}\n{tidied}\n```")
        }
    }
}

fn compress_text(text: &str, dedup: &mut BlockDedup) -> String {
    fenced_code_block()
        .replace_all(text, |caps: &Captures| dedup.process(caps))
        .into_owned()
}

pub fn compress_code_blocks(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut dedup = BlockDedup::new();
    messages
        .iter()
        .map(|m| match &m.content {
            Some(MessageContent::String(text)) => ChatMessage {
                role: m.role.clone(),
                content: Some(MessageContent::String(compress_text(text, &mut dedup))),
            },
            _ => m.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> ChatMessage {
        ChatMessage {
            role: "user".into(),
            content: Some(MessageContent::String(text.into())),
        }
    }

    #[test]
    fn trailing_whitespace_inside_blocks_is_stripped() {
        let out = compress_code_blocks(&[user("```rust\nfn a() {}   \n```")]);
        assert_eq!(out[0].content.as_ref().unwrap().as_text(), "```rust\nfn a() {}\n```");
    }

    #[test]
    fn second_block_with_same_body_becomes_a_back_reference() {
        let block = "```rust\nfn a() {}\n```";
        let out = compress_code_blocks(&[user(&format!("{block}\n\ntext\n\n{block}"))]);
        let text = out[0].content.as_ref().unwrap().as_text();
        assert!(text.contains("identical to code block #1 above"));
    }
}
