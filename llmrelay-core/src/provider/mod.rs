//! Provider adapter abstraction: one implementation per upstream kind,
//! registered by `provider_id` and dispatched to by the router.

mod anthropic;
mod claude_cli;
mod gemini;
mod ollama;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use claude_cli::{ClaudeCliAdapter, DispatchMode};
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use llmrelay_protocol::{ChatCompletionRequest, ChatMessage};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("malformed upstream response: {0}")]
    Parse(String),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("subprocess: {0}")]
    Process(String),
}

/// One non-streaming completion result, already normalized away from
/// provider-specific wire shapes.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallOut>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct ToolCallOut {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One incremental event from a provider's native stream, ahead of being
/// normalized into an OpenAI-compatible `chat.completion.chunk` by the
/// `stream` transformer layer.
#[derive(Debug, Clone)]
pub enum ProviderStreamEvent {
    TextDelta(String),
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: String,
    },
    Usage(Usage),
    Done { finish_reason: String },
}

pub type ProviderStream = BoxStream<'static, Result<ProviderStreamEvent, ProviderError>>;

/// One upstream call, with the router's chosen model substituted in for the
/// client-requested `model` field.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub tools: Option<Vec<llmrelay_protocol::ToolSpec>>,
    pub tool_choice: Option<llmrelay_protocol::ToolChoice>,
}

impl UpstreamRequest {
    pub fn from_client_request(req: &ChatCompletionRequest, model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            messages: req.messages.clone(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            stop: req.stop.clone(),
            tools: req.tools.clone(),
            tool_choice: req.tool_choice.clone(),
        }
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable key this adapter was registered under (e.g. `"openai"`).
    fn provider_id(&self) -> &str;

    async fn complete(&self, request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError>;

    async fn stream(&self, request: &UpstreamRequest) -> Result<ProviderStream, ProviderError>;

    /// How the most recent call reached the upstream model. HTTP adapters
    /// are always `"http"`; the subprocess adapter reports which of its
    /// three dispatch modes actually handled the last request.
    fn dispatch_mode(&self) -> &'static str {
        "http"
    }
}

/// Registry of live adapters, keyed by `provider_id`. Built once at startup
/// from the provider catalog and shared across every request.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider_id().to_string(), adapter);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdapter;

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn provider_id(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: &UpstreamRequest) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse::default())
        }

        async fn stream(&self, _request: &UpstreamRequest) -> Result<ProviderStream, ProviderError> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    #[test]
    fn registry_looks_up_by_provider_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubAdapter));
        assert!(registry.get("stub").is_some());
        assert!(registry.get("missing").is_none());
    }
}
