//! Priority-ordered fallback over several generation providers.
//!
//! [`ProviderFallbackClient::generate`] tries the primary provider first and
//! then every other registered provider in registration order. The first
//! success wins; every failure along the way is logged and collected so the
//! caller sees the full chain of causes when all providers fail.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chartgen_core::chart::{ChartSuggestion, ChartValidation, GenerationArtifact, SchemaContext};

use crate::provider::{GenerationProvider, ProviderError};

/// One failed provider attempt within a fallback chain.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

/// Errors from a complete pass over the fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    /// Nothing is registered; the client fails closed.
    #[error("No generation providers are configured")]
    NoProviders,

    /// Every provider in the chain failed for this request.
    #[error("All generation providers failed: {}", summarize(.attempts))]
    AllProvidersExhausted { attempts: Vec<ProviderFailure> },
}

fn summarize(attempts: &[ProviderFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Generation capability backed by an ordered chain of providers.
///
/// Configured once at startup with [`add_provider`](Self::add_provider) and
/// then shared via `Arc` by every batch job.
#[derive(Default)]
pub struct ProviderFallbackClient {
    providers: HashMap<String, Arc<dyn GenerationProvider>>,
    /// Registration order; each name appears once.
    fallback_order: Vec<String>,
    primary: Option<String>,
    /// Upper bound on a single provider attempt, on top of the provider's own timeout.
    attempt_timeout: Option<Duration>,
}

impl ProviderFallbackClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Register a provider under `name`.
    ///
    /// Re-registering a name replaces its implementation but keeps its
    /// original chain position. The most recent `is_primary` registration
    /// is tried first.
    pub fn add_provider(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn GenerationProvider>,
        is_primary: bool,
    ) {
        let name = name.into();
        if !self.providers.contains_key(&name) {
            self.fallback_order.push(name.clone());
        }
        if is_primary {
            self.primary = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in the order [`generate`](Self::generate) tries them.
    pub fn chain(&self) -> Vec<&str> {
        let primary = self.primary.as_deref();
        primary
            .into_iter()
            .chain(
                self.fallback_order
                    .iter()
                    .map(String::as_str)
                    .filter(|name| Some(*name) != primary),
            )
            .collect()
    }

    /// Generate a chart, falling back through the chain on failure.
    ///
    /// No provider is invoked more than once per call.
    pub async fn generate(
        &self,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, FallbackError> {
        if self.providers.is_empty() {
            return Err(FallbackError::NoProviders);
        }

        let mut attempts = Vec::new();
        for name in self.chain() {
            let Some(provider) = self.providers.get(name) else {
                continue;
            };

            match self.attempt(provider.as_ref(), prompt, context).await {
                Ok(artifact) => {
                    if !attempts.is_empty() {
                        tracing::info!(
                            provider = name,
                            failed_before = attempts.len(),
                            "Fallback provider succeeded",
                        );
                    }
                    return Ok(artifact);
                }
                Err(error) => {
                    tracing::warn!(provider = name, error = %error, "Provider failed, trying next");
                    attempts.push(ProviderFailure {
                        provider: name.to_string(),
                        error,
                    });
                }
            }
        }

        Err(FallbackError::AllProvidersExhausted { attempts })
    }

    /// Chart type suggestions from the primary provider only.
    pub async fn suggest_chart_types(
        &self,
        description: &str,
    ) -> Result<Vec<ChartSuggestion>, ProviderError> {
        match self.primary_provider() {
            Some(provider) => provider.suggest_chart_types(description).await,
            None => Ok(Vec::new()),
        }
    }

    /// Chart validation by the primary provider only; valid when there is none.
    pub async fn validate_chart(
        &self,
        chart_config: &serde_json::Value,
        original_prompt: &str,
    ) -> Result<ChartValidation, ProviderError> {
        match self.primary_provider() {
            Some(provider) => provider.validate_chart(chart_config, original_prompt).await,
            None => Ok(ChartValidation::valid()),
        }
    }

    fn primary_provider(&self) -> Option<&Arc<dyn GenerationProvider>> {
        self.primary.as_ref().and_then(|name| self.providers.get(name))
    }

    async fn attempt(
        &self,
        provider: &dyn GenerationProvider,
        prompt: &str,
        context: &SchemaContext,
    ) -> Result<GenerationArtifact, ProviderError> {
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, provider.generate(prompt, context))
                .await
                .map_err(|_| {
                    ProviderError::Timeout(format!("no response within {} ms", limit.as_millis()))
                })?,
            None => provider.generate(prompt, context).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
