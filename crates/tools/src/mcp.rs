//! Line-delimited JSON-RPC 2.0 front for the tool registry, as spoken by MCP
//! clients over stdio.

use std::sync::Arc;

use flightdesk_gateway::HttpBackend;
use flightdesk_observability::AppMetrics;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::registry::{ToolError, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2025-06-18";
pub const SERVER_NAME: &str = "flightdesk-mcp";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    backend: HttpBackend,
    metrics: Arc<AppMetrics>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, backend: HttpBackend, metrics: Arc<AppMetrics>) -> Self {
        Self {
            registry,
            backend,
            metrics,
        }
    }

    /// Reads requests until EOF. Notifications get no answer.
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut encoded = response.to_string();
                encoded.push('\n');
                output.write_all(encoded.as_bytes()).await?;
                output.flush().await?;
            }
        }
        debug!("mcp input closed");
        Ok(())
    }

    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "unparseable mcp message");
                return Some(error_response(Value::Null, PARSE_ERROR, "Parse error"));
            }
        };

        let request: RpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(_) => return Some(error_response(Value::Null, INVALID_REQUEST, "Invalid Request")),
        };

        let id = request.id?;
        let result = match request.method.as_str() {
            "initialize" => Ok(initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(request.params).await,
            other => {
                debug!(method = other, "unsupported mcp method");
                Err((METHOD_NOT_FOUND, "Method not found".to_string()))
            }
        };

        Some(match result {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => error_response(id, code, &message),
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .entries()
            .map(|(name, entry)| {
                json!({
                    "name": name,
                    "description": entry.description,
                    "inputSchema": entry.input_schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, (i64, String)> {
        let params: CallParams = serde_json::from_value(params)
            .map_err(|error| (INVALID_PARAMS, format!("Invalid params: {error}")))?;
        self.metrics.inc_tool_call();

        match self
            .registry
            .call(&self.backend, &params.name, params.arguments)
            .await
        {
            Ok(value) => Ok(tool_result(&value, false)),
            Err(ToolError::NotFound(name)) => {
                Err((INVALID_PARAMS, format!("Tool '{name}' not found")))
            }
            Err(error) => {
                if matches!(error, ToolError::Backend(_)) {
                    self.metrics.inc_backend_error();
                }
                warn!(tool = %params.name, %error, "mcp tool call failed");
                Ok(tool_result(&json!({ "error": error.to_string() }), true))
            }
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

fn tool_result(value: &Value, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": value.to_string() }],
        "isError": is_error,
    })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}
