//! `llmrelay` binary: loads config, wires the provider registry from the
//! catalog, and serves the HTTP surface.

use clap::Parser;
use llmrelay_cli::{bootstrap, refresh_providers, TextWithSpanIds};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "llmrelay", about = "OpenAI-compatible reverse proxy with routing, budgets, and caching")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "LLMRELAY_ADDR", default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .event_format(TextWithSpanIds::new())
        .with_env_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut state = bootstrap(None)?;
    refresh_providers(&mut state).await?;

    tracing::info!(addr = %args.addr, "starting llmrelay");
    llmrelay_server::run(Some(&args.addr), state)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}
