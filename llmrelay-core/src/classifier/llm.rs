//! Optional LLM-backed classification mode. Sends a compact abstract of the
//! conversation to an already-resolved economy-tier adapter and parses a
//! JSON verdict back out.
//!
//! This reuses the provider adapter abstraction directly rather than going
//! back through the router or cache (per the design note in §9): the
//! classifier is itself an outbound completion, and routing or caching it
//! would recurse into the very pipeline stage it serves.

use std::sync::Arc;

use serde::Deserialize;

use llmrelay_protocol::{ChatCompletionRequest, ChatMessage, MessageContent};

use crate::provider::{ProviderAdapter, ProviderError, UpstreamRequest, Usage};

use super::Category;

const MAX_ABSTRACT_CHARS: usize = 600;

const CLASSIFICATION_PROMPT: &str = "You are a routing classifier. Given a short abstract of a coding \
assistant conversation, respond with ONLY a JSON object of the form \
{\"category\": one of [\"code_gen\",\"code_review\",\"debug\",\"refactor\",\"explain\",\"simple_qa\",\"other\"], \
\"complexity\": integer 0-100}. No prose, no markdown fences.";

/// Token usage and cost for the classifier's own call, recorded separately
/// from the eventual task's usage so analytics can distinguish the two.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmClassification {
    pub usage: Usage,
    pub parsed: bool,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    category: String,
    complexity: u8,
}

fn category_from_str(s: &str) -> Category {
    match s {
        "code_gen" => Category::CodeGen,
        "code_review" => Category::CodeReview,
        "debug" => Category::Debug,
        "refactor" => Category::Refactor,
        "explain" => Category::Explain,
        "simple_qa" => Category::SimpleQa,
        _ => Category::Other,
    }
}

fn build_abstract(messages: &[ChatMessage]) -> String {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .unwrap_or_default();
    let truncated: String = last_user.chars().take(MAX_ABSTRACT_CHARS).collect();
    let has_tools = messages.iter().any(|m| m.role == "tool" || m.role == "function");
    format!(
        "conversation size: {} messages; has_tool_context: {}; last user turn:\n{}",
        messages.len(),
        has_tools,
        truncated
    )
}

/// Runs the LLM classification mode. On any transport or parse failure,
/// returns `Ok(None)` so the caller falls back to the heuristic classifier
/// rather than failing the request.
pub async fn classify_with_llm(
    adapter: Arc<dyn ProviderAdapter>,
    model_id: &str,
    messages: &[ChatMessage],
) -> Result<Option<(Category, u8, LlmClassification)>, ProviderError> {
    let request = ChatCompletionRequest {
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: Some(MessageContent::String(CLASSIFICATION_PROMPT.into())),
            },
            ChatMessage {
                role: "user".into(),
                content: Some(MessageContent::String(build_abstract(messages))),
            },
        ],
        model: model_id.to_string(),
        stream: false,
        stream_options: None,
        temperature: Some(0.0),
        max_tokens: Some(100),
        stop: None,
        tools: None,
        tool_choice: None,
    };
    let upstream = UpstreamRequest::from_client_request(&request, model_id);
    let response = adapter.complete(&upstream).await?;
    let usage = response.usage.unwrap_or_default();

    let parsed = serde_json::from_str::<Verdict>(response.content.trim())
        .ok()
        .map(|v| (category_from_str(&v.category), v.complexity.min(100)));

    Ok(parsed.map(|(category, complexity)| {
        (
            category,
            complexity,
            LlmClassification { usage, parsed: true },
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_abstract_truncates_long_user_text() {
        let long = "x".repeat(MAX_ABSTRACT_CHARS * 2);
        let messages = vec![ChatMessage {
            role: "user".into(),
            content: Some(MessageContent::String(long)),
        }];
        let abstract_text = build_abstract(&messages);
        assert!(abstract_text.len() < MAX_ABSTRACT_CHARS * 2);
    }

    #[test]
    fn category_from_str_falls_back_to_other() {
        assert_eq!(category_from_str("nonsense"), Category::Other);
        assert_eq!(category_from_str("debug"), Category::Debug);
    }
}
