mod bridge;
mod http;
mod mcp;
mod tools;

use std::future::Future;
use std::time::Duration;

use flightdesk_core::{FlightOffer, OnewayBookingRequest, SearchParams};
use serde_json::Value;
use thiserror::Error;

pub use bridge::{
    BridgeError, BridgeTransport, ToolBridge, BRIDGE_CALL_TIMEOUT, BRIDGE_SHUTDOWN_TIMEOUT,
};
pub use http::HttpBackend;
pub use mcp::{McpClient, McpCommand, MCP_PROTOCOL_VERSION};
pub use tools::{ToolClient, ToolDescriptor};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_TOOLS_URL: &str = "http://127.0.0.1:3333/tools";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {path} timed out")]
    Timeout { path: String },
    #[error("could not reach {path}: {message}")]
    Connect { path: String, message: String },
    #[error("{path} returned status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("{path} returned a body that is not JSON: {message}")]
    Decode { path: String, message: String },
    #[error("{0}")]
    Backend(String),
}

impl GatewayError {
    pub(crate) fn from_reqwest(path: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                path: path.to_string(),
            }
        } else if error.is_decode() {
            Self::Decode {
                path: path.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Connect {
                path: path.to_string(),
                message: error.to_string(),
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The `{ "error": reason }` shape used on every tool surface.
    pub fn to_payload(&self) -> Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Returns the message of an `{ "error": ... }` payload, if that is what the
/// value is.
pub fn error_marker(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Typed view of the booking backend used by the conversational agent.
/// Failures come back as values; nothing here panics on a bad backend.
pub trait FlightBackend: Send + Sync {
    fn search_flights(
        &self,
        params: &SearchParams,
    ) -> impl Future<Output = Result<Vec<FlightOffer>, GatewayError>> + Send;

    fn create_oneway_booking(
        &self,
        request: &OnewayBookingRequest,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;
}
