//! Provider for the Claude messages API.

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

pub const CLAUDE_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;

pub struct ClaudeProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(CLAUDE_BASE_URL, api_key, model, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request_body(&self, user: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": user }],
        })
    }

    async fn complete(&self, user: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(user))
            .send()
            .await?;

        let message: MessagesResponse = parse_response(response).await?;
        first_text(message)
    }
}

fn first_text(message: MessagesResponse) -> Result<String, ProviderError> {
    message
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| ProviderError::MalformedResponse("message has no text block".into()))
}

#[async_trait]
impl GenerationProvider for ClaudeProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, ProviderError> {
        // The system prompt travels inline with the user turn.
        let user = format!("{}\n\nUser request: {prompt}", build_system_prompt(context));
        let content = self.complete(&user).await?;
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
