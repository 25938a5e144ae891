//! Prompt classifier: (category, complexity) from the message list, either
//! by heuristic regex/keyword scoring or, optionally, by asking a cheap
//! model to do the classification itself.

mod heuristic;
mod llm;

pub use heuristic::{classify_heuristic, Category};
pub use llm::{classify_with_llm, LlmClassification};

use llmrelay_protocol::ChatMessage;

/// Result of classifying one request, regardless of which mode produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub complexity: u8,
    /// Present only when the LLM classifier ran (and succeeded or was attempted).
    pub llm_usage: Option<LlmClassification>,
}

impl Classification {
    pub fn heuristic(messages: &[ChatMessage]) -> Self {
        let (category, complexity) = classify_heuristic(messages);
        Self {
            category,
            complexity,
            llm_usage: None,
        }
    }
}
