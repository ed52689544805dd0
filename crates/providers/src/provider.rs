//! The generation provider capability.

use async_trait::async_trait;
use chartgen_core::chart::{ChartSuggestion, ChartValidation, GenerationArtifact, SchemaContext};

/// Errors from a single provider attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The provider did not answer within its time limit.
    #[error("Provider timed out: {0}")]
    Timeout(String),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response arrived but could not be parsed into the expected shape.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// The provider refused the request.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// A backing service able to turn a natural-language prompt into a chart.
///
/// Implementations must be cheap to share: the fallback client holds them
/// behind `Arc` and calls them concurrently from many item generations.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a chart for `prompt` against the tables in `context`.
    async fn generate(
        &self,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, ProviderError>;

    /// Propose chart types for a data description.
    async fn suggest_chart_types(
        &self,
        _description: &str,
    ) -> Result<Vec<ChartSuggestion>, ProviderError> {
        Ok(Vec::new())
    }

    /// Judge whether `chart_config` represents `original_prompt`.
    async fn validate_chart(
        &self,
        _chart_config: &serde_json::Value,
        _original_prompt: &str,
    ) -> Result<ChartValidation, ProviderError> {
        Ok(ChartValidation::valid())
    }
}
