//! In-memory provider with scripted behavior, for tests and local runs.
//!
//! A [`ScriptedProvider`] never touches the network. It succeeds or fails
//! according to its script, optionally sleeps first, counts its calls and
//! records the prompts it received in call order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chartgen_core::chart::{ChartSuggestion, ChartValidation, GenerationArtifact, SchemaContext};
use serde_json::json;

use crate::provider::{GenerationProvider, ProviderError};

/// Confidence reported by scripted artifacts.
pub const SCRIPTED_CONFIDENCE: f64 = 0.8;

pub struct ScriptedProvider {
    name: String,
    fail_all: bool,
    /// Prompts containing any of these markers fail.
    failing_markers: Vec<String>,
    delay: Duration,
    /// Per-marker delays, overriding `delay` for matching prompts.
    marker_delays: Vec<(String, Duration)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn build(name: impl Into<String>, fail_all: bool) -> Self {
        Self {
            name: name.into(),
            fail_all,
            failing_markers: Vec::new(),
            delay: Duration::ZERO,
            marker_delays: Vec::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always returns an artifact titled with the provider's name.
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::build(name, false)
    }

    /// Always fails with [`ProviderError::Rejected`].
    pub fn failing(name: impl Into<String>) -> Self {
        Self::build(name, true)
    }

    /// Fail only prompts that contain `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.failing_markers.push(marker.into());
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep `delay` before answering prompts that contain `marker`.
    pub fn delaying(mut self, marker: impl Into<String>, delay: Duration) -> Self {
        self.marker_delays.push((marker.into(), delay));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of `generate` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn delay_for(&self, prompt: &str) -> Duration {
        self.marker_delays
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, d)| *d)
            .unwrap_or(self.delay)
    }

    fn fails(&self, prompt: &str) -> bool {
        self.fail_all || self.failing_markers.iter().any(|m| prompt.contains(m.as_str()))
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(prompt.to_string()),
            Err(poisoned) => poisoned.into_inner().push(prompt.to_string()),
        }

        let delay = self.delay_for(prompt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fails(prompt) {
            return Err(ProviderError::Rejected(format!(
                "{} refused prompt {prompt:?}",
                self.name
            )));
        }

        Ok(GenerationArtifact {
            chart_type: "bar".into(),
            title: self.name.clone(),
            sql_query: "SELECT 1".into(),
            chart_config: json!({ "prompt": prompt, "schema": context.as_value() }),
            confidence: SCRIPTED_CONFIDENCE,
            reasoning: format!("scripted by {}", self.name),
        })
    }

    async fn suggest_chart_types(
        &self,
        _description: &str,
    ) -> Result<Vec<ChartSuggestion>, ProviderError> {
        if self.fail_all {
            return Err(ProviderError::Rejected(format!("{} refused", self.name)));
        }
        Ok(vec![ChartSuggestion {
            chart_type: "bar".into(),
            confidence: SCRIPTED_CONFIDENCE,
            reasoning: format!("scripted by {}", self.name),
            config: json!({}),
        }])
    }

    async fn validate_chart(
        &self,
        _chart_config: &serde_json::Value,
        _original_prompt: &str,
    ) -> Result<ChartValidation, ProviderError> {
        Ok(ChartValidation::valid())
    }
}
