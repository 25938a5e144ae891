//! OpenAI-compatible chat completion request DTOs.
//!
//! Field names match the [OpenAI Chat Completions API]
//! (https://platform.openai.com/docs/api-reference/chat). Message `content`
//! can be a string or an array of parts (multimodal); both are accepted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Requested model name, or a `"provider:model"` pin. The router resolves
    /// this; the upstream model actually used may differ.
    pub model: String,
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default)]
    pub stream_options: Option<StreamOptions>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<MessageContent>,
}

/// Message content: either a plain string or an array of parts (OpenAI multimodal).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    String(String),
    Array(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of this content: the string as-is, or the concatenation of all
    /// `text` parts in order. Non-text parts (e.g. `image_url`) are skipped.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::String(s) => s.clone(),
            MessageContent::Array(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::String(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ToolFunctionSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolFunctionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// `tool_choice`: `"auto"` / `"none"` / `"required"`, or a forced function pick.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Forced {
        #[serde(rename = "type")]
        choice_type: String,
        function: ForcedFunction,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForcedFunction {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_string_as_text() {
        let c: MessageContent = serde_json::from_value(serde_json::json!("hello")).unwrap();
        assert_eq!(c.as_text(), "hello");
    }

    #[test]
    fn message_content_array_concatenates_text_parts() {
        let c: MessageContent = serde_json::from_value(serde_json::json!([
            {"type": "text", "text": "hello "},
            {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}},
            {"type": "text", "text": "world"},
        ]))
        .unwrap();
        assert_eq!(c.as_text(), "hello world");
    }

    #[test]
    fn request_defaults_stream_to_true() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .unwrap();
        assert!(req.stream);
        assert!(req.tools.is_none());
    }

    #[test]
    fn tool_choice_mode_parses_from_string() {
        let choice: ToolChoice = serde_json::from_value(serde_json::json!("auto")).unwrap();
        assert!(matches!(choice, ToolChoice::Mode(m) if m == "auto"));
    }
}
