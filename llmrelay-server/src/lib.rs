//! HTTP server for the chat-completions relay (axum).
//!
//! Listens on http://127.0.0.1:8080 by default and serves the OpenAI-compatible
//! `/v1/chat/completions` and `/v1/models` endpoints plus the `/api/*`
//! dashboard surface (stats, live activity feed, feedback, settings, catalog).
//!
//! **Public API**: [`run`], [`run_on_listener`].

mod app;
mod error;
mod routes;

use tokio::net::TcpListener;
use tracing::info;

pub use app::{router, AppState};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Serves on an already-bound listener. Used by tests (bind to 127.0.0.1:0,
/// then read back the assigned port before passing the listener in).
pub async fn run_on_listener(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("llmrelay listening on http://{addr}");
    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds `addr` (default `127.0.0.1:8080`) and serves until the process is
/// killed.
pub async fn run(addr: Option<&str>, state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_on_listener(listener, state).await
}
