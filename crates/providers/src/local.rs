//! Provider for a local LLM server speaking the Ollama `/api/generate` API.

use std::time::Duration;

use async_trait::async_trait;
use chartgen_core::chart::{ChartSuggestion, ChartValidation, GenerationArtifact, SchemaContext};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::{build_client, parse_response};
use crate::prompt::{
    build_suggest_prompt, build_system_prompt, build_validate_prompt, parse_artifact,
    parse_suggestions, parse_validation,
};
use crate::provider::{GenerationProvider, ProviderError};

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama2";

pub struct LocalLlmProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LocalLlmProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "format": "json",
            "stream": false,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let generated: GenerateResponse = parse_response(response).await?;
        Ok(generated.response)
    }
}

#[async_trait]
impl GenerationProvider for LocalLlmProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, ProviderError> {
        let full = format!("{}\n\nUser: {prompt}", build_system_prompt(context));
        let content = self.complete(&full).await?;
        parse_artifact(&content)
    }

    async fn suggest_chart_types(
        &self,
        description: &str,
    ) -> Result<Vec<ChartSuggestion>, ProviderError> {
        let content = self.complete(&build_suggest_prompt(description)).await?;
        parse_suggestions(&content)
    }

    async fn validate_chart(
        &self,
        chart_config: &Value,
        original_prompt: &str,
    ) -> Result<ChartValidation, ProviderError> {
        let content = self
            .complete(&build_validate_prompt(chart_config, original_prompt))
            .await?;
        parse_validation(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_disables_streaming() {
        let p = LocalLlmProvider::new(DEFAULT_LOCAL_URL, DEFAULT_LOCAL_MODEL, Duration::from_secs(5));
        let body = p.request_body("x");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["model"], DEFAULT_LOCAL_MODEL);
    }
}
