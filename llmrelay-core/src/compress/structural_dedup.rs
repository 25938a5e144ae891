//! Stage 2: structural dedup. Hashes semantic blocks (fenced code, paired
//! XML-ish tags) by `(kind, content)`; every occurrence after the first is
//! replaced with a `[ref:block:<hash>]` marker pointing back to it.

use std::collections::HashSet;
use std::sync::OnceLock;

use llmrelay_protocol::{ChatMessage, MessageContent};
use regex::Regex;
use sha2::{Digest, Sha256};

fn hex4(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn fenced_code_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[^\n]*\n.*?\n```").unwrap())
}

fn paired_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<([A-Za-z][\w-]*)>.*?</\1>").unwrap())
}

fn short_hash(kind: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    hex4(&digest[..4])
}

fn dedupe_text(text: &str, seen: &mut HashSet<String>) -> String {
    let after_code = fenced_code_block().replace_all(text, |caps: &regex::Captures| {
        let whole = &caps[0];
        let hash = short_hash("code", whole);
        if seen.insert(hash.clone()) {
            whole.to_string()
        } else {
            format!("[ref:block:{hash}]")
        }
    });
    paired_tag()
        .replace_all(&after_code, |caps: &regex::Captures| {
            let whole = &caps[0];
            let hash = short_hash("tag", whole);
            if seen.insert(hash.clone()) {
                whole.to_string()
            } else {
                format!("[ref:block:{hash}]")
            }
        })
        .into_owned()
}

pub fn deduplicate(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .map(|m| match &m.content {
            Some(MessageContent::String(text)) => ChatMessage {
                role: m.role.clone(),
                content: Some(MessageContent::String(dedupe_text(text, &mut seen))),
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
    fn second_identical_code_block_is_replaced_with_a_reference() {
        let block = "```rust\nfn main() {}\n```";
        let out = deduplicate(&[user(&format!("{block}\n\nsome text\n\n{block}"))]);
        let text = out[0].content.as_ref().unwrap().as_text();
        assert_eq!(text.matches("fn main").count(), 1);
        assert!(text.contains("[ref:block:"));
    }

    #[test]
    fn distinct_blocks_both_survive() {
        let a = "```rust\nfn a() {}\n```";
        let b = "```rust\nfn b() {}\n```";
        let out = deduplicate(&[user(&format!("{a}\n\n{b}"))]);
        let text = out[0].content.as_ref().unwrap().as_text();
        assert!(text.contains("fn a") && text.contains("fn b"));
    }

    #[test]
    fn duplicate_across_messages_is_still_caught() {
        let block = "<thinking>same reasoning every time</thinking>";
        let out = deduplicate(&[user(block), user(block)]);
        let second = out[1].content.as_ref().unwrap().as_text();
        assert!(second.contains("[ref:block:"));
    }
}
