//! Stage 5: context trimmer. Only runs once the conversation is already
//! past the earlier stages' reach and still estimated above the size
//! threshold. System messages and the most recent turns survive verbatim;
//! everything older is shortened, never removed outright, so earlier
//! context remains available but cheap.

use std::sync::OnceLock;

use llmrelay_protocol::{ChatMessage, MessageContent};
use regex::Regex;

const KEEP_LAST_TURNS: usize = 10;
const MAX_OLD_TURN_CHARS: usize = 500;

fn fenced_code_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[^\n]*\n.*?\n```").unwrap())
}

fn shorten(text: &str) -> String {
    let without_code = fenced_code_block().replace_all(text, "[code omitted]");
    if without_code.len() <= MAX_OLD_TURN_CHARS {
        without_code.into_owned()
    } else {
        let mut truncated = without_code[..MAX_OLD_TURN_CHARS].to_string();
        truncated.push_str(" [trimmed]");
        truncated
    }
}

pub fn trim(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let conversational_count = messages.iter().filter(|m| m.role != "system").count();
    if conversational_count <= KEEP_LAST_TURNS {
        return messages.to_vec();
    }

    let cutoff = conversational_count - KEEP_LAST_TURNS;
    let mut seen_conversational = 0usize;
    messages
        .iter()
        .map(|m| {
            if m.role == "system" {
                return m.clone();
            }
            let index = seen_conversational;
            seen_conversational += 1;
            match &m.content {
                Some(MessageContent::String(text)) if index < cutoff => ChatMessage {
                    role: m.role.clone(),
                    content: Some(MessageContent::String(shorten(text))),
                },
                _ => m.clone(),
            }
        })
        .collect()
}
