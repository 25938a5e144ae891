//! Anthropic Messages API adapter. Distinct from OpenAI's wire shape in three
//! ways this module absorbs so the rest of the pipeline never sees them:
//! the system prompt is a dedicated top-level field, not a message with
//! `role: system`; auth is `x-api-key` + `anthropic-version`, not bearer;
//! and content is a list of typed blocks, not a bare string.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    CompletionResponse, ProviderAdapter, ProviderError, ProviderStream, ProviderStreamEvent,
    ToolCallOut, UpstreamRequest, Usage,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request_body(&self, request: &UpstreamRequest, stream: bool) -> serde_json::Value {
        let system: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .filter_map(|m| m.content.as_ref().map(|c| c.as_text()))
            .collect();
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                json!({
                    "role": m.role,
                    "content": m.content.as_ref().map(|c| c.as_text()).unwrap_or_default(),
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model_id,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });
        let obj = body.as_object_mut().expect("object literal");
        if !system.is_empty() {
            obj.insert("system".into(), json!(system.join("\n\n")));
        }
        if let Some(t) = request.temperature {
            obj.insert("temperature".into(), json!(t));
        }
        if let Some(stop) = &request.stop {
            obj.insert("stop_sequences".into(), json!(stop));
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageDelta { delta: MessageDeltaPayload },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Serialize)]
struct MessageDeltaPayload {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.request_body(request, false);
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body });
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCallOut {
                    id: Some(id),
                    name,
                    arguments: input.to_string(),
                }),
                ContentBlock::Other => {}
            }
        }

        Ok(CompletionResponse {
            content,
            tool_calls,
            finish_reason: parsed.stop_reason,
            usage: parsed.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        })
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<ProviderStream, ProviderError> {
        let body = self.request_body(request, true);
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body });
        }

        let events = resp.bytes_stream().flat_map(|chunk| {
            let parsed = match chunk {
                Ok(bytes) => parse_sse_chunk(&bytes),
                Err(e) => vec![Err(ProviderError::Http(e))],
            };
            futures::stream::iter(parsed)
        });
        Ok(Box::pin(events))
    }
}

fn parse_sse_chunk(bytes: &[u8]) -> Vec<Result<ProviderStreamEvent, ProviderError>> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        match serde_json::from_str::<StreamEvent>(data) {
            Ok(StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { text } }) => {
                out.push(Ok(ProviderStreamEvent::TextDelta(text)));
            }
            Ok(StreamEvent::MessageDelta { delta }) => {
                if let Some(reason) = delta.stop_reason {
                    out.push(Ok(ProviderStreamEvent::Done { finish_reason: reason }));
                }
            }
            Ok(StreamEvent::MessageStop) | Ok(StreamEvent::Other) | Ok(StreamEvent::ContentBlockDelta { .. }) => {}
            Err(e) => out.push(Err(ProviderError::Parse(e.to_string()))),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta_event() {
        let line = b"data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n";
        let events = parse_sse_chunk(line);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(ProviderStreamEvent::TextDelta(ref s)) if s == "hi"));
    }

    #[test]
    fn parses_stop_reason_from_message_delta() {
        let line = b"data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n";
        let events = parse_sse_chunk(line);
        assert!(matches!(events[0], Ok(ProviderStreamEvent::Done { .. })));
    }
}
