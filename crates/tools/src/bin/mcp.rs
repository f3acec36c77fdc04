use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use flightdesk_gateway::{BackendConfig, HttpBackend, DEFAULT_BACKEND_URL, DEFAULT_HTTP_TIMEOUT};
use flightdesk_observability::{init_tracing, AppMetrics};
use flightdesk_tools::{McpServer, ToolRegistry};
use tokio::io::BufReader;

/// stdout carries the protocol, so logs go to stderr only.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("flightdesk_mcp", "info");

    let backend_url =
        env::var("FLIGHTDESK_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
    let timeout = env::var("FLIGHTDESK_HTTP_TIMEOUT_SECONDS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT);

    let backend = HttpBackend::new(&BackendConfig {
        base_url: backend_url.clone(),
        timeout,
    })
    .with_context(|| format!("invalid backend url {backend_url}"))?;
    let metrics = AppMetrics::shared();
    let server = McpServer::new(Arc::new(ToolRegistry::standard()), backend, Arc::clone(&metrics));

    tracing::info!(backend_url = %backend_url, "flightdesk mcp server started");
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("mcp stdio loop failed")?;

    tracing::info!(metrics = ?metrics.snapshot(), "flightdesk mcp server stopped");
    Ok(())
}
