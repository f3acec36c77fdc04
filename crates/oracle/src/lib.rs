mod fallback;
pub mod json;
mod ollama;
mod openai;
pub mod prompts;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use fallback::OfflineOracle;
pub use ollama::OllamaOracle;
pub use openai::{extract_openai_output_text, OpenAiOracle, OPENAI_RESPONSES_URL};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(&'static str),
    #[error("oracle misconfigured: {0}")]
    Misconfigured(String),
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle returned no text")]
    EmptyOutput,
}

/// A text-in, text-out completion endpoint. Callers treat every error as a
/// cue to fall back to deterministic handling.
pub trait LanguageOracle: Send + Sync {
    fn name(&self) -> &'static str;

    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, OracleError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleKind {
    Ollama,
    OpenAi,
    Offline,
}

impl OracleKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ollama" | "local" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            "offline" | "none" | "rules" => Some(Self::Offline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub kind: OracleKind,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::Offline,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Oracle chosen at startup from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredOracle {
    Ollama(OllamaOracle),
    OpenAi(OpenAiOracle),
    Offline(OfflineOracle),
}

impl ConfiguredOracle {
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        if config.kind == OracleKind::Offline {
            return Ok(Self::Offline(OfflineOracle));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.timeout)
            .build()?;

        match config.kind {
            OracleKind::Ollama => Ok(Self::Ollama(OllamaOracle::new(
                client,
                &config.ollama_url,
                &config.ollama_model,
            ))),
            OracleKind::OpenAi => {
                let api_key = config
                    .openai_api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        OracleError::Misconfigured("openai oracle requires an API key".to_string())
                    })?;
                Ok(Self::OpenAi(OpenAiOracle::new(
                    client,
                    api_key,
                    &config.openai_model,
                )))
            }
            OracleKind::Offline => Ok(Self::Offline(OfflineOracle)),
        }
    }
}

impl LanguageOracle for ConfiguredOracle {
    fn name(&self) -> &'static str {
        match self {
            Self::Ollama(oracle) => oracle.name(),
            Self::OpenAi(oracle) => oracle.name(),
            Self::Offline(oracle) => oracle.name(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        match self {
            Self::Ollama(oracle) => oracle.complete(prompt).await,
            Self::OpenAi(oracle) => oracle.complete(prompt).await,
            Self::Offline(oracle) => oracle.complete(prompt).await,
        }
    }
}
