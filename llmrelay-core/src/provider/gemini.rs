//! Gemini adapter. Non-streaming only today: Gemini's `streamGenerateContent`
//! uses a JSON-array framing rather than SSE, which the dispatcher does not
//! yet speak. Callers that request streaming against this provider fall back
//! to a single chunk built from the completed response.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{
    CompletionResponse, ProviderAdapter, ProviderError, ProviderStream, ProviderStreamEvent,
    UpstreamRequest, Usage,
};

pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError> {
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                json!({
                    "role": if m.role == "assistant" { "model" } else { "user" },
                    "parts": [{"text": m.content.as_ref().map(|c| c.as_text()).unwrap_or_default()}],
                })
            })
            .collect();

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model_id, self.api_key
        );
        let resp = self
            .client
            .post(url)
            .json(&json!({ "contents": contents }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body });
        }

        let parsed: GenerateContentResponse =
            resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("no candidates in response".into()))?;
        let content = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            tool_calls: Vec::new(),
            finish_reason: candidate.finish_reason,
            usage: parsed.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            }),
        })
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<ProviderStream, ProviderError> {
        let response = self.complete(request).await?;
        let events = vec![
            Ok(ProviderStreamEvent::TextDelta(response.content)),
            Ok(ProviderStreamEvent::Done {
                finish_reason: response.finish_reason.unwrap_or_else(|| "stop".into()),
            }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
