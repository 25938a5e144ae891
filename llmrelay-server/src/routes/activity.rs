//! `GET /api/activity/stream` — SSE feed of `{active, feed}` snapshots: the
//! in-flight requests polled off the process-local
//! [`llmrelay_core::ActivityRegistry`], plus a trailing window of recently
//! completed ones pulled from the durable store (§4.11).

use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;

use crate::app::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const FEED_LIMIT: u32 = 20;

#[derive(Serialize)]
struct ActiveRequestView {
    id: String,
    category: Option<String>,
    provider_id: Option<String>,
    model_id: Option<String>,
    elapsed_ms: u128,
    tokens_out_estimate: u32,
}

pub async fn stream(State(state): State<AppState>) -> impl IntoResponse {
    let ticks = IntervalStream::new(tokio::time::interval(POLL_INTERVAL));
    let body = ticks.then(move |_| {
        let state = state.clone();
        async move {
            state.pipeline.activity().sweep();
            let snapshot = state.pipeline.activity().snapshot();
            let active: Vec<ActiveRequestView> = snapshot
                .into_iter()
                .map(|r| {
                    let tokens_out_estimate = state.pipeline.activity().tokens_out_estimate(&r.id).unwrap_or(0);
                    ActiveRequestView {
                        id: r.id,
                        category: r.category,
                        provider_id: r.provider_id,
                        model_id: r.model_id,
                        elapsed_ms: r.started_at.elapsed().as_millis(),
                        tokens_out_estimate,
                    }
                })
                .collect();
            let feed = state.store.recent_requests(FEED_LIMIT).await.unwrap_or_default();
            let json = serde_json::to_string(&serde_json::json!({ "active": active, "feed": feed }))
                .unwrap_or_else(|_| r#"{"active":[],"feed":[]}"#.to_string());
            Ok::<_, std::io::Error>(axum::body::Bytes::from(format!("data: {json}\n\n")))
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "text/event-stream")
        .header(axum::http::header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .expect("static response headers are always valid")
}
