// [[RARO]]/apps/eval-server/src/main.rs
// Purpose: Entry point. Resolves which evaluation service to run and serves it.
// Architecture: Application Boot
// Dependencies: Axum, Tower, Tokio

mod config;
mod error;
mod gemini;
mod mcp;
mod models;
mod observability;
mod pricing;
mod registry;
mod runtime;
mod scoring;
mod server;
mod tokenstats;
mod usage;

use anyhow::Context;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::runtime::EvalRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing()?;

    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    tracing::info!("Initializing {} service...", config.kind);

    let port = config.port;
    let runtime = Arc::new(EvalRuntime::new(config));
    let app = server::router(runtime);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Evaluation server listening on http://{}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
