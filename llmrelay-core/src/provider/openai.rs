//! OpenAI-compatible adapter: talks to the OpenAI Chat Completions API and
//! anything that mirrors it (most self-hosted gateways included).

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    CompletionResponse, ProviderAdapter, ProviderError, ProviderStream, ProviderStreamEvent,
    ToolCallOut, UpstreamRequest, Usage,
};

pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
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
        let mut body = json!({
            "model": request.model_id,
            "messages": messages,
            "stream": stream,
        });
        let obj = body.as_object_mut().expect("object literal");
        if let Some(t) = request.temperature {
            obj.insert("temperature".into(), json!(t));
        }
        if let Some(m) = request.max_tokens {
            obj.insert("max_tokens".into(), json!(m));
        }
        if let Some(stop) = &request.stop {
            obj.insert("stop".into(), json!(stop));
        }
        if let Some(tools) = &request.tools {
            obj.insert("tools".into(), serde_json::to_value(tools).unwrap_or(json!([])));
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize, Serialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.request_body(request, false);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body });
        }

        let parsed: ChatCompletion = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("no choices in response".into()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|tc| ToolCallOut {
                    id: Some(tc.id),
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect(),
            finish_reason: choice.finish_reason,
            usage: parsed.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<ProviderStream, ProviderError> {
        let body = self.request_body(request, true);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body });
        }

        let byte_stream = resp.bytes_stream();
        let events = byte_stream.flat_map(|chunk| {
            let lines: Vec<Result<ProviderStreamEvent, ProviderError>> = match chunk {
                Ok(bytes) => parse_sse_chunk(&bytes),
                Err(e) => vec![Err(ProviderError::Http(e))],
            };
            futures::stream::iter(lines)
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
        if data == "[DONE]" {
            out.push(Ok(ProviderStreamEvent::Done {
                finish_reason: "stop".into(),
            }));
            continue;
        }
        let parsed: Result<StreamChunk, _> = serde_json::from_str(data);
        match parsed {
            Ok(chunk) => {
                if let Some(choice) = chunk.choices.into_iter().next() {
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            out.push(Ok(ProviderStreamEvent::TextDelta(content)));
                        }
                    }
                    if let Some(reason) = choice.finish_reason {
                        out.push(Ok(ProviderStreamEvent::Done { finish_reason: reason }));
                    }
                }
            }
            Err(e) => out.push(Err(ProviderError::Parse(e.to_string()))),
        }
    }
    out
}
