use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use flightdesk_gateway::{BackendConfig, DEFAULT_BACKEND_URL, DEFAULT_HTTP_TIMEOUT};
use flightdesk_observability::init_tracing;
use flightdesk_tools::{build_app, DEFAULT_BIND};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("flightdesk_tools", "info");

    let backend_url =
        env::var("FLIGHTDESK_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
    let bind = env::var("FLIGHTDESK_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let timeout = env::var("FLIGHTDESK_HTTP_TIMEOUT_SECONDS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT);

    let app = build_app(&BackendConfig {
        base_url: backend_url.clone(),
        timeout,
    })?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, backend_url = %backend_url, "flightdesk tool server started");

    axum::serve(listener, app).await?;
    Ok(())
}
