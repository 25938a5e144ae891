//! HTTP handlers, one module per route group.

pub mod activity;
pub mod catalog;
pub mod chat;
pub mod feedback;
pub mod models;
pub mod settings;
pub mod stats;

use axum::http::HeaderMap;

/// Pulls the agentic-client hint out of `User-Agent`, falling back to
/// `X-Client-Name` for callers that can't set a custom user agent.
pub(crate) fn client_hint(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-client-name")
        .or_else(|| headers.get(axum::http::header::USER_AGENT))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
