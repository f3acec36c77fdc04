use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{error_marker, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ToolListing {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Client for the tool-dispatch service (`POST {base}/{name}` with an
/// `{ "args": ... }` envelope).
#[derive(Debug, Clone)]
pub struct ToolClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ToolClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|_| GatewayError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Client(error.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let path = self.base_url.path().to_string();
        let response = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|error| GatewayError::from_reqwest(&path, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                path,
                status: status.as_u16(),
                body,
            });
        }

        let listing = response
            .json::<ToolListing>()
            .await
            .map_err(|error| GatewayError::Decode {
                path,
                message: error.to_string(),
            })?;
        Ok(listing.tools)
    }

    /// Invokes one tool. The service answers `{ "error": ... }` for unknown
    /// tools and failed backend calls, whatever the status code; that shape
    /// comes back as [`GatewayError::Backend`].
    pub async fn call(&self, tool: &str, args: Value) -> Result<Value, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(tool);
        let path = url.path().to_string();

        let response = self
            .client
            .post(url)
            .json(&json!({ "args": args }))
            .send()
            .await
            .map_err(|error| GatewayError::from_reqwest(&path, error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| GatewayError::from_reqwest(&path, error))?;

        let value = match serde_json::from_str::<Value>(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(GatewayError::Status {
                    path,
                    status: status.as_u16(),
                    body,
                })
            }
            Err(error) => {
                return Err(GatewayError::Decode {
                    path,
                    message: error.to_string(),
                })
            }
        };

        if let Some(message) = error_marker(&value) {
            return Err(GatewayError::Backend(message));
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                path,
                status: status.as_u16(),
                body,
            });
        }

        debug!(tool, status = status.as_u16(), "tool call succeeded");
        Ok(value)
    }
}
