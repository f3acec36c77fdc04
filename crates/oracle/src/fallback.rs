use crate::{LanguageOracle, OracleError};

/// Used when no model is configured. Every completion fails, which sends
/// callers down their rule-based paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl LanguageOracle for OfflineOracle {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("no language model configured"))
    }
}
