//! OpenAI-compatible non-streaming `chat.completion` response DTO.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ResponseChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
}

impl ChatCompletionResponse {
    pub const OBJECT: &'static str = "chat.completion";
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: &'static str,
    pub function: ResponseToolCallFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResponseUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_omitted_when_none_serializes_without_the_field() {
        let response = ChatCompletionResponse {
            id: "chatcmpl-1".into(),
            object: ChatCompletionResponse::OBJECT,
            created: 0,
            model: "gpt-4o-mini".into(),
            choices: vec![ResponseChoice {
                index: 0,
                message: ResponseMessage { role: "assistant", content: Some("hi".into()), tool_calls: None },
                finish_reason: Some("stop".into()),
            }],
            usage: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("usage"));
        assert!(json.contains("\"object\":\"chat.completion\""));
    }
}
