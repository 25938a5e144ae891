//! Ollama adapter: local inference server, OpenAI-adjacent wire shape but
//! its own `/api/chat` endpoint and NDJSON (not SSE) streaming framing.
//! No API key; cost is always zero.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;

use super::{
    CompletionResponse, ProviderAdapter, ProviderError, ProviderStream, ProviderStreamEvent,
    UpstreamRequest, Usage,
};

pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn request_body(&self, request: &UpstreamRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role,
                    "content": m.content.as_ref().map(|c| c.as_text()).unwrap_or_default(),
                })
            })
            .collect();
        json!({
            "model": request.model_id,
            "messages": messages,
            "stream": stream,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    done: bool,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn provider_id(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.request_body(request, false);
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(CompletionResponse {
            content: parsed.message.content,
            tool_calls: Vec::new(),
            finish_reason: if parsed.done { Some("stop".into()) } else { None },
            usage: Some(Usage {
                prompt_tokens: parsed.prompt_eval_count,
                completion_tokens: parsed.eval_count,
            }),
        })
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<ProviderStream, ProviderError> {
        let body = self.request_body(request, true);
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
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
                Ok(bytes) => parse_ndjson_chunk(&bytes),
                Err(e) => vec![Err(ProviderError::Http(e))],
            };
            futures::stream::iter(parsed)
        });
        Ok(Box::pin(events))
    }
}

fn parse_ndjson_chunk(bytes: &[u8]) -> Vec<Result<ProviderStreamEvent, ProviderError>> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ChatResponse>(line) {
            Ok(resp) => {
                if !resp.message.content.is_empty() {
                    out.push(Ok(ProviderStreamEvent::TextDelta(resp.message.content)));
                }
                if resp.done {
                    out.push(Ok(ProviderStreamEvent::Done { finish_reason: "stop".into() }));
                }
            }
            Err(e) => out.push(Err(ProviderError::Parse(e.to_string()))),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ndjson_line_into_text_delta() {
        let line = b"{\"message\":{\"content\":\"hi\"},\"done\":false}\n";
        let events = parse_ndjson_chunk(line);
        assert!(matches!(events[0], Ok(ProviderStreamEvent::TextDelta(ref s)) if s == "hi"));
    }

    #[test]
    fn done_flag_emits_done_event() {
        let line = b"{\"message\":{\"content\":\"\"},\"done\":true}\n";
        let events = parse_ndjson_chunk(line);
        assert!(matches!(events[0], Ok(ProviderStreamEvent::Done { .. })));
    }
}
