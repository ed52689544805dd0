//! Provider for OpenAI-compatible chat completion APIs.
//!
//! Serves both OpenAI itself and Groq, which exposes the same
//! `POST {base}/chat/completions` contract.

use std::time::Duration;

use async_trait::async_trait;
use chartgen_core::chart::{ChartSuggestion, ChartValidation, GenerationArtifact, SchemaContext};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::{build_client, parse_response};
use crate::prompt::{
    build_suggest_prompt, build_system_prompt, build_validate_prompt, parse_artifact,
    parse_suggestions, parse_validation, GENERATE_TEMPERATURE, SUGGEST_TEMPERATURE,
    VALIDATE_TEMPERATURE,
};
use crate::provider::{GenerationProvider, ProviderError};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Client for one OpenAI-compatible endpoint and model.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Request `response_format: json_object` (OpenAI supports it, Groq does not need it).
    json_mode: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        json_mode: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            json_mode,
        }
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self::new(OPENAI_BASE_URL, api_key, model, true, timeout)
    }

    pub fn groq(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self::new(GROQ_BASE_URL, api_key, model, false, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for one chat completion.
    fn request_body(&self, system: Option<&str>, user: &str, temperature: f64) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        if self.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    /// Run one chat completion and return the first choice's text.
    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        temperature: f64,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system, user, temperature))
            .send()
            .await?;

        let completion: ChatCompletion = parse_response(response).await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("completion has no content".into()))
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, ProviderError> {
        let system = build_system_prompt(context);
        let content = self
            .complete(Some(&system), prompt, GENERATE_TEMPERATURE)
            .await?;
        parse_artifact(&content)
    }

    async fn suggest_chart_types(
        &self,
        description: &str,
    ) -> Result<Vec<ChartSuggestion>, ProviderError> {
        let content = self
            .complete(None, &build_suggest_prompt(description), SUGGEST_TEMPERATURE)
            .await?;
        parse_suggestions(&content)
    }

    async fn validate_chart(
        &self,
        chart_config: &Value,
        original_prompt: &str,
    ) -> Result<ChartValidation, ProviderError> {
        let user = build_validate_prompt(chart_config, original_prompt);
        let content = self.complete(None, &user, VALIDATE_TEMPERATURE).await?;
        parse_validation(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_requests_json_mode() {
        let p = OpenAiCompatProvider::openai("k", "gpt-4", Duration::from_secs(5));
        let body = p.request_body(Some("sys"), "hello", 0.3);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["model"], "gpt-4");
    }

    #[test]
    fn groq_omits_json_mode_and_system_when_absent() {
        let p = OpenAiCompatProvider::groq("k", "mixtral", Duration::from_secs(5));
        let body = p.request_body(None, "hello", 0.2);
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let p = OpenAiCompatProvider::new("http://x/v1/", "k", "m", false, Duration::from_secs(1));
        assert_eq!(p.base_url, "http://x/v1");
    }

    #[test]
    fn completion_content_deserializes() {
        let c: ChatCompletion = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{}" } }]
        }))
        .unwrap();
        assert_eq!(c.choices[0].message.content.as_deref(), Some("{}"));
    }
}
