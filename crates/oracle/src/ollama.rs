use serde::Deserialize;
use tracing::debug;

use crate::{LanguageOracle, OracleError};

#[derive(Debug, Clone)]
pub struct OllamaOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaOracle {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

impl LanguageOracle for OllamaOracle {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0 }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        debug!(model = %self.model, chars = body.response.len(), "ollama completion");

        let text = body.response.trim();
        if text.is_empty() {
            return Err(OracleError::EmptyOutput);
        }
        Ok(text.to_string())
    }
}
