//! Request pipeline for the chat-completions relay: classification and
//! routing, provider dispatch, prompt compression, caching, budget
//! enforcement, and response evaluation sit here; HTTP plumbing lives in
//! the server crate, storage in the store crate.

pub mod activity;
pub mod budget;
pub mod cache;
pub mod classifier;
pub mod compress;
pub mod error;
pub mod evaluator;
pub mod feedback;
pub mod pipeline;
pub mod provider;
pub mod router;
pub mod stream;

pub use activity::{ActiveRequest, ActivityRegistry};
pub use budget::{downgrade_model_id, BudgetGuardDecision};
pub use cache::{Cache, CacheError, InMemoryCache};
pub use classifier::{classify_with_llm, Category, Classification, LlmClassification};
pub use compress::{compress, estimate_tokens, CompressionResult, StageReport};
pub use error::PipelineError;
pub use evaluator::{evaluate, score_response};
pub use feedback::{FeedbackCommand, FeedbackError};
pub use provider::{
    AnthropicAdapter, ClaudeCliAdapter, CompletionResponse, DispatchMode, GeminiAdapter,
    OllamaAdapter, OpenAiAdapter, ProviderAdapter, ProviderError, ProviderRegistry,
    ProviderStream, ProviderStreamEvent, ToolCallOut, UpstreamRequest, Usage,
};
pub use pipeline::{Pipeline, PipelineOutcome, StreamOutcome};
pub use router::{resolve, select_for_tier, RouteDecision, RouteRequest};
pub use stream::{transform_stream, ScanOutput, ToolCallScanner};
