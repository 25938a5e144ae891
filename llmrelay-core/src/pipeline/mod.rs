//! The request orchestrator: the thirteen-step path from an inbound chat
//! completion request to a response, threading feedback short-circuiting,
//! dedup, classification, routing, budget enforcement, caching,
//! compression, provider dispatch, and persistence together (§4.1).

mod agentic_client;
mod cache_key;

pub use agentic_client::maybe_upgrade_for_agentic_client;
pub use cache_key::{cache_key, dedup_fingerprint};

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, BoxStream, Stream, StreamExt};

use llmrelay_catalog::Tier;
use llmrelay_protocol::{ChatCompletionChunk, ChatCompletionRequest, ChunkChoice, ChunkMeta, Delta};
use llmrelay_store::{RequestRecord, Store, StepStatus};

use crate::activity::{ActiveRequest, ActivityRegistry};
use crate::budget::{self, BudgetGuardDecision};
use crate::cache::{Cache, InMemoryCache};
use crate::classifier::Classification;
use crate::compress;
use crate::error::PipelineError;
use crate::evaluator;
use crate::feedback;
use crate::provider::{CompletionResponse, ProviderError, ProviderRegistry, UpstreamRequest};
use crate::router::{self, RouteDecision, RouteRequest};
use crate::stream::transform_stream;

/// Cache-check step is non-streaming only (§4.1 step 7); entries live 60s.
const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(60);
/// Dedup-check step is non-streaming only (§4.1 step 3).
const DEDUP_WINDOW: Duration = Duration::from_secs(5);

/// What the pipeline produced: a synthetic reply handled entirely inside
/// the relay (feedback confirmations), or a real provider response.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Synthetic {
        request_id: String,
        content: String,
    },
    Completed {
        response: CompletionResponse,
        provider_id: String,
        model_id: String,
        cache_hit: bool,
        request_id: String,
        router_reason: String,
        tokens_saved: u32,
        dispatch_mode: String,
    },
}

/// Streaming counterpart of `PipelineOutcome`: everything needed for the
/// response headers is known before the first byte leaves the provider, so
/// it travels alongside the stream rather than trailing it.
pub struct StreamOutcome {
    pub request_id: String,
    pub provider_id: String,
    pub model_id: String,
    pub router_reason: String,
    pub tokens_saved: u32,
    pub dispatch_mode: String,
    pub stream: BoxStream<'static, Result<ChatCompletionChunk, ProviderError>>,
}

pub struct Pipeline {
    store: Store,
    providers: ProviderRegistry,
    activity: ActivityRegistry,
    response_cache: InMemoryCache<String, CompletionResponse>,
    dedup_guard: InMemoryCache<String, ()>,
}

impl Pipeline {
    pub fn new(store: Store, providers: ProviderRegistry) -> Self {
        Self {
            store,
            providers,
            activity: ActivityRegistry::new(),
            response_cache: InMemoryCache::new(),
            dedup_guard: InMemoryCache::new(),
        }
    }

    pub fn activity(&self) -> &ActivityRegistry {
        &self.activity
    }

    fn last_user_text(request: &ChatCompletionRequest) -> Option<String> {
        request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(|m| m.content.as_ref())
            .map(|c| c.as_text())
    }

    async fn record_step(&self, request_id: &str, step: &str, status: StepStatus, started: Option<Instant>) {
        let duration_ms = started.map(|s| s.elapsed().as_millis() as u64);
        if let Err(err) = self.store.insert_step(request_id, step, status, duration_ms, None).await {
            tracing::debug!(error = %err, request_id, step, "failed to persist step record");
        }
    }

    /// Runs the non-streaming path end to end. The streaming path shares
    /// every step up through dispatch; only the final provider call and
    /// response transformation differ (see `stream::transform_stream`).
    pub async fn handle(
        &self,
        request: &ChatCompletionRequest,
        client_hint: Option<&str>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let request_id = format!("req-{}", uuid::Uuid::new_v4());

        // Step 2: /feedback short-circuit, never reaches a provider.
        if let Some(text) = Self::last_user_text(request) {
            if let Ok(command) = feedback::parse(&text) {
                self.record_step(&request_id, "feedback", StepStatus::Started, None).await;
                let confirmation = match feedback::apply(&self.store, &command).await {
                    Ok(msg) => msg,
                    Err(err) => err.to_string(),
                };
                self.record_step(&request_id, "feedback", StepStatus::Completed, None).await;
                return Ok(PipelineOutcome::Synthetic { request_id, content: confirmation });
            }
        }

        // Step 3: dedup guard against duplicate retries fired within the window.
        let fingerprint = dedup_fingerprint(request);
        if self.dedup_guard.get(&fingerprint).await.is_some() {
            self.record_step(&request_id, "dedup", StepStatus::Error, None).await;
            return Err(PipelineError::DuplicateRequest(fingerprint));
        }
        let _ = self.dedup_guard.set(fingerprint.clone(), (), Some(DEDUP_WINDOW)).await;
        self.record_step(&request_id, "dedup", StepStatus::Completed, None).await;

        // Step 4: classify, then route (with the agentic-client upgrade folded in).
        let classify_started = Instant::now();
        let classification = Classification::heuristic(&request.messages);
        self.record_step(&request_id, "classify", StepStatus::Completed, Some(classify_started)).await;

        let route_started = Instant::now();
        let requested_model = maybe_upgrade_for_agentic_client(&request.model, client_hint);
        let route_request = RouteRequest {
            requested_model,
            category: classification.category,
            complexity: classification.complexity,
            default_provider: "openai".to_string(),
        };
        let mut decision = router::resolve(&self.store, &route_request).await?;
        self.record_step(&request_id, "route", StepStatus::Completed, Some(route_started)).await;

        // Step 5: budget guard; a warning-band budget downgrades the pick one notch.
        let budget_started = Instant::now();
        match budget::check(&self.store, chrono::Utc::now()).await {
            BudgetGuardDecision::Deny => {
                self.record_step(&request_id, "budget_check", StepStatus::Error, Some(budget_started)).await;
                return Err(PipelineError::BudgetExhausted(llmrelay_catalog::BudgetPeriod::Daily));
            }
            BudgetGuardDecision::ProceedDowngraded => {
                decision.model_id = budget::downgrade_model_id(&decision.model_id).to_string();
            }
            BudgetGuardDecision::Proceed => {}
        }
        self.record_step(&request_id, "budget_check", StepStatus::Completed, Some(budget_started)).await;

        // Step 6: response cache, keyed on the resolved model so a cache hit
        // always reflects what would actually have been dispatched.
        let key = cache_key(&decision.provider_id, &decision.model_id, request);
        if let Some(cached) = self.response_cache.get(&key).await {
            self.record_step(&request_id, "cache_check", StepStatus::Completed, None).await;
            self.persist(
                &request_id,
                &decision,
                &classification,
                0,
                0.0,
                0,
                0,
                0,
                Some(true),
                None,
                true,
            )
            .await;
            return Ok(PipelineOutcome::Completed {
                response: cached,
                provider_id: decision.provider_id,
                model_id: decision.model_id,
                cache_hit: true,
                request_id,
                router_reason: decision.reason,
                tokens_saved: 0,
                dispatch_mode: "cache".to_string(),
            });
        }
        self.record_step(&request_id, "cache_check", StepStatus::Skipped, None).await;

        // Step 7: compress the prompt before it leaves the process.
        let compress_started = Instant::now();
        let compression = compress::compress(&request.messages);
        let tokens_saved = compression.tokens_before.saturating_sub(compression.tokens_after);
        self.record_step(&request_id, "compress", StepStatus::Completed, Some(compress_started)).await;

        // Step 8: dispatch to the resolved provider.
        let adapter = self.providers.get(&decision.provider_id).ok_or_else(|| {
            PipelineError::ProviderUnavailable(format!("no adapter registered for provider {}", decision.provider_id))
        })?;
        let dispatch_mode = adapter.dispatch_mode().to_string();
        let upstream = UpstreamRequest {
            model_id: decision.model_id.clone(),
            messages: compression.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: request.stop.clone(),
            tools: request.tools.clone(),
            tool_choice: request.tool_choice.clone(),
        };

        self.activity.register(ActiveRequest {
            id: request_id.clone(),
            category: Some(classification.category.as_str().to_string()),
            provider_id: Some(decision.provider_id.clone()),
            model_id: Some(decision.model_id.clone()),
            started_at: Instant::now(),
        });

        let dispatch_started = Instant::now();
        self.record_step(&request_id, "provider_dispatch", StepStatus::Started, None).await;
        let outcome = adapter.complete(&upstream).await;
        let latency_ms = dispatch_started.elapsed().as_millis() as u64;
        self.activity.unregister(&request_id);

        let response = match outcome {
            Ok(response) => {
                self.record_step(&request_id, "provider_dispatch", StepStatus::Completed, Some(dispatch_started)).await;
                response
            }
            Err(err) => {
                self.record_step(&request_id, "provider_dispatch", StepStatus::Error, Some(dispatch_started)).await;
                self.persist(
                    &request_id,
                    &decision,
                    &classification,
                    latency_ms,
                    0.0,
                    tokens_saved,
                    0,
                    0,
                    Some(false),
                    Some(err.to_string()),
                    false,
                )
                .await;
                return Err(PipelineError::Provider(err));
            }
        };

        // Step 9: heuristic + CLI-success evaluation.
        let (is_success, _score) = evaluator::evaluate(true, &response.content, classification.category, classification.complexity, None);

        // Step 10: cost accounting against the catalog's per-token pricing.
        let cost_usd = match self.store.find_model(&decision.provider_id, &decision.model_id).await {
            Ok(Some(model)) => response
                .usage
                .map(|u| model.estimate_cost(u.prompt_tokens, u.completion_tokens))
                .unwrap_or(0.0),
            _ => 0.0,
        };

        // Step 11: populate the response cache.
        let (tokens_in, tokens_out) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));
        let _ = self.response_cache.set(key, response.clone(), Some(RESPONSE_CACHE_TTL)).await;

        // Step 12: persist the request record (fire-and-forget from the
        // caller's perspective; the HTTP response doesn't wait on this).
        self.persist(
            &request_id,
            &decision,
            &classification,
            latency_ms,
            cost_usd,
            tokens_saved,
            tokens_in,
            tokens_out,
            Some(is_success),
            None,
            false,
        )
        .await;
        self.record_step(&request_id, "response_sent", StepStatus::Completed, None).await;

        Ok(PipelineOutcome::Completed {
            response,
            provider_id: decision.provider_id,
            model_id: decision.model_id,
            cache_hit: false,
            request_id,
            router_reason: decision.reason,
            tokens_saved,
            dispatch_mode,
        })
    }

    /// Streaming counterpart of `handle`: shares classification, routing,
    /// budget, and compression with the non-streaming path; dedup and cache
    /// are non-streaming-only steps (§4.1 steps 3 and 7) so neither runs
    /// here. Dispatch goes through `adapter.stream()` + `transform_stream`,
    /// and persistence happens once the returned stream is fully drained
    /// rather than before `handle_stream` returns. Takes `Arc<Self>` so the
    /// trailing bookkeeping can outlive the call that produced the stream.
    pub async fn handle_stream(
        self: Arc<Self>,
        request: &ChatCompletionRequest,
        client_hint: Option<&str>,
    ) -> Result<StreamOutcome, PipelineError> {
        let request_id = format!("req-{}", uuid::Uuid::new_v4());

        if let Some(text) = Self::last_user_text(request) {
            if let Ok(command) = feedback::parse(&text) {
                let confirmation = match feedback::apply(&self.store, &command).await {
                    Ok(msg) => msg,
                    Err(err) => err.to_string(),
                };
                return Ok(StreamOutcome {
                    request_id: request_id.clone(),
                    provider_id: String::new(),
                    model_id: request.model.clone(),
                    router_reason: "feedback shortcut".to_string(),
                    tokens_saved: 0,
                    dispatch_mode: "synthetic".to_string(),
                    stream: replay_stream(&request_id, &request.model, confirmation),
                });
            }
        }

        let classification = Classification::heuristic(&request.messages);
        let requested_model = maybe_upgrade_for_agentic_client(&request.model, client_hint);
        let route_request = RouteRequest {
            requested_model,
            category: classification.category,
            complexity: classification.complexity,
            default_provider: "openai".to_string(),
        };
        let mut decision = router::resolve(&self.store, &route_request).await?;

        match budget::check(&self.store, chrono::Utc::now()).await {
            BudgetGuardDecision::Deny => {
                return Err(PipelineError::BudgetExhausted(llmrelay_catalog::BudgetPeriod::Daily));
            }
            BudgetGuardDecision::ProceedDowngraded => {
                decision.model_id = budget::downgrade_model_id(&decision.model_id).to_string();
            }
            BudgetGuardDecision::Proceed => {}
        }

        let compression = compress::compress(&request.messages);
        let tokens_saved = compression.tokens_before.saturating_sub(compression.tokens_after);

        let adapter = self.providers.get(&decision.provider_id).ok_or_else(|| {
            PipelineError::ProviderUnavailable(format!("no adapter registered for provider {}", decision.provider_id))
        })?;
        let dispatch_mode = adapter.dispatch_mode().to_string();
        let upstream = UpstreamRequest {
            model_id: decision.model_id.clone(),
            messages: compression.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: request.stop.clone(),
            tools: request.tools.clone(),
            tool_choice: request.tool_choice.clone(),
        };

        self.activity.register(ActiveRequest {
            id: request_id.clone(),
            category: Some(classification.category.as_str().to_string()),
            provider_id: Some(decision.provider_id.clone()),
            model_id: Some(decision.model_id.clone()),
            started_at: Instant::now(),
        });

        let source = adapter.stream(&upstream).await.map_err(|err| {
            self.activity.unregister(&request_id);
            PipelineError::Provider(err)
        })?;
        let meta = ChunkMeta::new(request_id.clone(), decision.model_id.clone());
        let chunks = transform_stream(source, meta);

        let provider_id = decision.provider_id.clone();
        let model_id = decision.model_id.clone();
        let router_reason = decision.reason.clone();

        let state = PersistState {
            inner: Box::pin(chunks),
            pipeline: self,
            request_id: request_id.clone(),
            decision,
            classification,
            tokens_saved,
            started: Instant::now(),
            content: String::new(),
            tool_call_acc: VecDeque::new(),
            usage: None,
            done: false,
        };

        Ok(StreamOutcome {
            request_id,
            provider_id,
            model_id,
            router_reason,
            tokens_saved,
            dispatch_mode,
            stream: stream::unfold(state, drive_persisting_stream).boxed(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        request_id: &str,
        decision: &router::RouteDecision,
        classification: &Classification,
        latency_ms: u64,
        cost_usd: f64,
        compressed_bytes_saved: u32,
        tokens_in: u32,
        tokens_out: u32,
        success: Option<bool>,
        error_message: Option<String>,
        cache_hit: bool,
    ) {
        let tier = Tier::from_complexity(classification.complexity).alias().to_string();
        let record = RequestRecord {
            id: request_id.to_string(),
            created_at: chrono::Utc::now(),
            category: Some(classification.category.as_str().to_string()),
            complexity_score: Some(classification.complexity),
            tier,
            provider_id: Some(decision.provider_id.clone()),
            model_id: Some(decision.model_id.clone()),
            tokens_in,
            tokens_out,
            cost_usd,
            latency_ms: Some(latency_ms),
            cache_hit,
            compressed_bytes_saved,
            success,
            error_message,
            feedback_score: None,
        };
        if let Err(err) = self.store.insert_request(&record).await {
            tracing::warn!(error = %err, request_id, "failed to persist request record");
        }
        self.record_step(request_id, "log_task", StepStatus::Completed, None).await;
    }
}

/// Wraps a one-shot synthetic or cached answer in a two-chunk stream
/// (content then finish), so clients that asked for `stream: true` always
/// get an SSE stream back regardless of which pipeline shortcut answered
/// them.
fn replay_stream(
    id: &str,
    model: &str,
    content: String,
) -> BoxStream<'static, Result<ChatCompletionChunk, ProviderError>> {
    let mut meta = ChunkMeta::new(id.to_string(), model.to_string());
    let created = meta.created_secs();
    let text_chunk = ChatCompletionChunk {
        id: meta.id.clone(),
        object: ChatCompletionChunk::OBJECT,
        created,
        model: meta.model.clone(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: Delta {
                role: Some("assistant".to_string()),
                content: Some(content),
                tool_calls: None,
            },
            finish_reason: None,
        }],
        usage: None,
    };
    let finish_chunk = ChatCompletionChunk {
        id: meta.id.clone(),
        object: ChatCompletionChunk::OBJECT,
        created,
        model: meta.model,
        choices: vec![ChunkChoice {
            index: 0,
            delta: Delta::default(),
            finish_reason: Some("stop".to_string()),
        }],
        usage: None,
    };
    stream::iter(vec![Ok(text_chunk), Ok(finish_chunk)]).boxed()
}

/// Threaded through `handle_stream`'s output stream so the trailing
/// bookkeeping (activity feed, the request record) happens once the
/// client has actually received every chunk, not before.
struct PersistState {
    inner: Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ProviderError>> + Send>>,
    pipeline: Arc<Pipeline>,
    request_id: String,
    decision: RouteDecision,
    classification: Classification,
    tokens_saved: u32,
    started: Instant,
    content: String,
    tool_call_acc: VecDeque<(u32, Option<String>, String, String)>,
    usage: Option<crate::provider::Usage>,
    done: bool,
}

fn accumulate_tool_call(state: &mut PersistState, delta: &llmrelay_protocol::DeltaToolCall) {
    if let Some(entry) = state.tool_call_acc.iter_mut().find(|(index, ..)| *index == delta.index) {
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                entry.2 = name.clone();
            }
            if let Some(arguments) = &function.arguments {
                entry.3.push_str(arguments);
            }
        }
    } else {
        let (name, arguments) = delta
            .function
            .as_ref()
            .map(|f| (f.name.clone().unwrap_or_default(), f.arguments.clone().unwrap_or_default()))
            .unwrap_or_default();
        state.tool_call_acc.push_back((delta.index, delta.id.clone(), name, arguments));
    }
}

async fn finalize_stream(state: &mut PersistState, error: Option<&ProviderError>) {
    state.pipeline.activity.unregister(&state.request_id);
    let latency_ms = state.started.elapsed().as_millis() as u64;

    if let Some(err) = error {
        state
            .pipeline
            .persist(
                &state.request_id,
                &state.decision,
                &state.classification,
                latency_ms,
                0.0,
                state.tokens_saved,
                0,
                0,
                Some(false),
                Some(err.to_string()),
                false,
            )
            .await;
        return;
    }

    let tool_calls = state
        .tool_call_acc
        .iter()
        .map(|(_, id, name, arguments)| crate::provider::ToolCallOut {
            id: id.clone(),
            name: name.clone(),
            arguments: arguments.clone(),
        })
        .collect::<Vec<_>>();
    let response = CompletionResponse {
        content: state.content.clone(),
        tool_calls,
        finish_reason: Some("stop".to_string()),
        usage: state.usage,
    };

    let (is_success, _score) = evaluator::evaluate(
        true,
        &response.content,
        state.classification.category,
        state.classification.complexity,
        None,
    );

    let cost_usd = match state
        .pipeline
        .store
        .find_model(&state.decision.provider_id, &state.decision.model_id)
        .await
    {
        Ok(Some(model)) => response
            .usage
            .map(|u| model.estimate_cost(u.prompt_tokens, u.completion_tokens))
            .unwrap_or(0.0),
        _ => 0.0,
    };

    let (tokens_in, tokens_out) = response.usage.map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));

    state
        .pipeline
        .persist(
            &state.request_id,
            &state.decision,
            &state.classification,
            latency_ms,
            cost_usd,
            state.tokens_saved,
            tokens_in,
            tokens_out,
            Some(is_success),
            None,
            false,
        )
        .await;
}

async fn drive_persisting_stream(
    mut state: PersistState,
) -> Option<(Result<ChatCompletionChunk, ProviderError>, PersistState)> {
    if state.done {
        return None;
    }

    match state.inner.next().await {
        Some(Ok(chunk)) => {
            for choice in &chunk.choices {
                if let Some(text) = &choice.delta.content {
                    if !text.is_empty() {
                        state.content.push_str(text);
                        state.pipeline.activity.record_chunk(&state.request_id, text);
                    }
                }
                if let Some(tool_calls) = &choice.delta.tool_calls {
                    for delta in tool_calls {
                        accumulate_tool_call(&mut state, delta);
                    }
                }
                if choice.finish_reason.is_some() {
                    state.done = true;
                }
            }
            if let Some(usage) = &chunk.usage {
                state.usage = Some(crate::provider::Usage {
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                });
            }
            if state.done {
                finalize_stream(&mut state, None).await;
            }
            Some((Ok(chunk), state))
        }
        Some(Err(err)) => {
            state.done = true;
            finalize_stream(&mut state, Some(&err)).await;
            Some((Err(err), state))
        }
        None => {
            if !state.done {
                state.done = true;
                finalize_stream(&mut state, None).await;
            }
            None
        }
    }
}
