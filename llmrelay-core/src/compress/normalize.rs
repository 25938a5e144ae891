//! Stage 1: whitespace and markup normalization. Touches only plain-string
//! message bodies; multimodal array content (image parts etc.) passes
//! through untouched since there is no text to normalize without losing
//! non-text parts.

use std::sync::OnceLock;

use llmrelay_protocol::{ChatMessage, MessageContent};
use regex::Regex;

fn blank_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn trailing_spaces() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+\n").unwrap())
}

fn inline_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").unwrap())
}

fn bullet_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*)[*+](\s+)").unwrap())
}

fn normalize_text(text: &str) -> String {
    let collapsed_blanks = blank_run().replace_all(text, "\n\n");
    let no_trailing = trailing_spaces().replace_all(&collapsed_blanks, "\n");
    let unified_bullets = bullet_marker().replace_all(&no_trailing, "$1-$2");
    let collapsed_inline = inline_run().replace_all(&unified_bullets, " ");
    collapsed_inline.trim_end().to_string()
}

pub fn normalize(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| match &m.content {
            Some(MessageContent::String(text)) => ChatMessage {
                role: m.role.clone(),
                content: Some(MessageContent::String(normalize_text(text))),
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
    fn collapses_blank_lines_and_inline_runs() {
        let out = normalize(&[user("a\n\n\n\nb   c")]);
        assert_eq!(out[0].content.as_ref().unwrap().as_text(), "a\n\nb c");
    }

    #[test]
    fn unifies_bullet_markers() {
        let out = normalize(&[user("* one\n+ two\n- three")]);
        assert_eq!(out[0].content.as_ref().unwrap().as_text(), "- one\n- two\n- three");
    }

    #[test]
    fn array_content_passes_through_untouched() {
        let msg = ChatMessage {
            role: "user".into(),
            content: Some(MessageContent::Array(vec![])),
        };
        let out = normalize(&[msg]);
        assert!(matches!(out[0].content, Some(MessageContent::Array(_))));
    }
}
