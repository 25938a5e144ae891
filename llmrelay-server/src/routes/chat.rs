//! `POST /v1/chat/completions` — the one endpoint every client actually
//! calls. Branches on `request.stream`; both branches share the same
//! pipeline, they just consume its output differently.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;

use llmrelay_core::PipelineOutcome;
use llmrelay_protocol::{
    ChatCompletionRequest, ChatCompletionResponse, ResponseChoice, ResponseMessage,
    ResponseToolCall, ResponseToolCallFunction, ResponseUsage,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::client_hint;

pub async fn completions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "invalid_json", format!("malformed request body: {err}")))?;
    if request.messages.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalid_messages", "messages must not be empty"));
    }

    let hint = client_hint(&headers);

    if request.stream {
        let outcome = state.pipeline.clone().handle_stream(&request, hint.as_deref()).await?;
        let body = outcome.stream.map(|item| match item {
            Ok(chunk) => Ok::<_, std::io::Error>(axum::body::Bytes::from(llmrelay_protocol::write_sse_line(&chunk))),
            Err(err) => Ok(axum::body::Bytes::from(format!(
                "data: {{\"error\":{{\"message\":{:?}}}}}\n\n",
                err.to_string()
            ))),
        });
        let done = futures::stream::once(async { Ok::<_, std::io::Error>(axum::body::Bytes::from(llmrelay_protocol::DONE_LINE)) });
        let response_body = Body::from_stream(body.chain(done));
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(axum::http::header::CONTENT_TYPE, "text/event-stream")
            .header(axum::http::header::CACHE_CONTROL, "no-cache")
            .body(response_body)
            .expect("static response headers are always valid");
        set_header(response.headers_mut(), "x-request-id", &outcome.request_id);
        set_header(response.headers_mut(), "x-provider", &outcome.provider_id);
        set_header(response.headers_mut(), "x-model", &format!("{}/{}", outcome.provider_id, outcome.model_id));
        set_header(response.headers_mut(), "x-router-reason", &outcome.router_reason);
        set_header(response.headers_mut(), "x-tokens-saved", &outcome.tokens_saved.to_string());
        set_header(response.headers_mut(), "x-dispatch-mode", &outcome.dispatch_mode);
        set_header(response.headers_mut(), "x-cache-hit", "false");
        return Ok(response);
    }

    let outcome = state.pipeline.handle(&request, hint.as_deref()).await?;
    let (response, headers) = match outcome {
        PipelineOutcome::Synthetic { request_id, content } => {
            let response = ChatCompletionResponse {
                id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
                object: ChatCompletionResponse::OBJECT,
                created: now_secs(),
                model: request.model.clone(),
                choices: vec![ResponseChoice {
                    index: 0,
                    message: ResponseMessage { role: "assistant", content: Some(content), tool_calls: None },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            };
            (response, vec![("x-request-id", request_id)])
        }
        PipelineOutcome::Completed {
            response,
            provider_id,
            model_id,
            cache_hit,
            request_id,
            router_reason,
            tokens_saved,
            dispatch_mode,
        } => {
            let tool_calls = if response.tool_calls.is_empty() {
                None
            } else {
                Some(
                    response
                        .tool_calls
                        .into_iter()
                        .map(|call| ResponseToolCall {
                            id: call.id.unwrap_or_else(|| format!("call-{}", uuid::Uuid::new_v4())),
                            call_type: "function",
                            function: ResponseToolCallFunction { name: call.name, arguments: call.arguments },
                        })
                        .collect(),
                )
            };
            let content = if response.content.is_empty() && tool_calls.is_some() { None } else { Some(response.content) };
            let usage = response.usage.map(|u| ResponseUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.prompt_tokens + u.completion_tokens,
            });
            let body = ChatCompletionResponse {
                id: request_id.clone(),
                object: ChatCompletionResponse::OBJECT,
                created: now_secs(),
                model: model_id.clone(),
                choices: vec![ResponseChoice {
                    index: 0,
                    message: ResponseMessage { role: "assistant", content, tool_calls },
                    finish_reason: Some(response.finish_reason.unwrap_or_else(|| "stop".to_string())),
                }],
                usage,
            };
            let headers = vec![
                ("x-request-id", request_id.clone()),
                ("x-task-id", request_id),
                ("x-provider", provider_id.clone()),
                ("x-model", format!("{provider_id}/{model_id}")),
                ("x-router-reason", router_reason),
                ("x-tokens-saved", tokens_saved.to_string()),
                ("x-dispatch-mode", dispatch_mode),
                ("x-cache-hit", cache_hit.to_string()),
            ];
            (body, headers)
        }
    };

    let mut response = Json(response).into_response();
    for (name, value) in headers {
        set_header(response.headers_mut(), name, &value);
    }
    Ok(response)
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
