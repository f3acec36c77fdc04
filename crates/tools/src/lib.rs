pub mod mcp;
pub mod registry;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use flightdesk_gateway::{BackendConfig, HttpBackend};
use flightdesk_observability::{AppMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use mcp::McpServer;
pub use registry::{ToolError, ToolRegistry};

pub const DEFAULT_BIND: &str = "127.0.0.1:3333";

#[derive(Clone)]
pub struct ToolState {
    pub registry: Arc<ToolRegistry>,
    pub backend: HttpBackend,
    pub metrics: Arc<AppMetrics>,
}

impl ToolState {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let backend = HttpBackend::new(config)
            .with_context(|| format!("invalid backend configuration for {}", config.base_url))?;

        Ok(Self {
            registry: Arc::new(ToolRegistry::standard()),
            backend,
            metrics: AppMetrics::shared(),
        })
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    backend_url: String,
    tools: usize,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Default, Deserialize)]
struct ToolCall {
    #[serde(default)]
    args: Value,
}

pub fn build_app(config: &BackendConfig) -> Result<Router> {
    let state = ToolState::new(config)?;
    Ok(build_router(state))
}

pub fn build_router(state: ToolState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(call_tool))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

async fn health(State(state): State<ToolState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        backend_url: state.backend.base_url().to_string(),
        tools: state.registry.len(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn list_tools(State(state): State<ToolState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "tools": state.registry.descriptors() })),
    )
}

/// `{ "args": {...} }` in, backend JSON out. An empty body or a missing
/// `args` field means no arguments.
async fn call_tool(
    State(state): State<ToolState>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let call = if body.iter().all(u8::is_ascii_whitespace) {
        ToolCall::default()
    } else {
        match serde_json::from_slice::<ToolCall>(&body) {
            Ok(call) => call,
            Err(error) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid request body: {error}") })),
                )
            }
        }
    };

    state.metrics.inc_tool_call();
    match state.registry.call(&state.backend, &name, call.args).await {
        Ok(value) => {
            info!(tool = %name, "tool call served");
            (StatusCode::OK, Json(value))
        }
        Err(error) => {
            let status = match &error {
                ToolError::NotFound(_) => StatusCode::NOT_FOUND,
                error if error.is_client_error() => StatusCode::BAD_REQUEST,
                _ => {
                    state.metrics.inc_backend_error();
                    StatusCode::BAD_GATEWAY
                }
            };
            warn!(tool = %name, status = status.as_u16(), %error, "tool call failed");
            (status, Json(json!({ "error": error.to_string() })))
        }
    }
}
