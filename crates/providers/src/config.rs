//! Provider configuration from the environment and fallback chain assembly.

use std::sync::Arc;
use std::time::Duration;

use crate::claude::ClaudeProvider;
use crate::fallback::ProviderFallbackClient;
use crate::local::{LocalLlmProvider, DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_URL};
use crate::openai::OpenAiCompatProvider;

pub const PROVIDER_OPENAI: &str = "openai";
pub const PROVIDER_GROQ: &str = "groq";
pub const PROVIDER_CLAUDE: &str = "claude";
pub const PROVIDER_LOCAL: &str = "local";

const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";
const DEFAULT_CLAUDE_MODEL: &str = "claude-3-sonnet-20240229";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Credentials and model for one hosted provider.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedProviderConfig {
    pub api_key: String,
    pub model: String,
}

/// Which providers to register and how to reach them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub openai: Option<HostedProviderConfig>,
    pub groq: Option<HostedProviderConfig>,
    pub claude: Option<HostedProviderConfig>,
    pub local_url: String,
    pub local_model: String,
    pub local_enabled: bool,
    /// HTTP timeout applied to every provider request.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai: None,
            groq: None,
            claude: None,
            local_url: DEFAULT_LOCAL_URL.into(),
            local_model: DEFAULT_LOCAL_MODEL.into(),
            local_enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `OPENAI_API_KEY`        | unset (provider skipped)    |
    /// | `OPENAI_MODEL`          | `gpt-4`                     |
    /// | `GROQ_API_KEY`          | unset (provider skipped)    |
    /// | `GROQ_MODEL`            | `mixtral-8x7b-32768`        |
    /// | `CLAUDE_API_KEY`        | unset (provider skipped)    |
    /// | `CLAUDE_MODEL`          | `claude-3-sonnet-20240229`  |
    /// | `LOCAL_LLM_URL`         | `http://localhost:11434`    |
    /// | `LOCAL_LLM_MODEL`       | `llama2`                    |
    /// | `LOCAL_LLM_ENABLED`     | `true`                      |
    /// | `PROVIDER_TIMEOUT_SECS` | `60`                        |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let hosted = |key_var: &str, model_var: &str, default_model: &str| {
            lookup(key_var)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .map(|api_key| HostedProviderConfig {
                    api_key,
                    model: lookup(model_var).unwrap_or_else(|| default_model.into()),
                })
        };

        let local_enabled = match lookup("LOCAL_LLM_ENABLED") {
            Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"),
            None => true,
        };

        let timeout_secs = match lookup("PROVIDER_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid PROVIDER_TIMEOUT_SECS, using default");
                DEFAULT_TIMEOUT_SECS
            }),
            None => DEFAULT_TIMEOUT_SECS,
        };

        Self {
            openai: hosted("OPENAI_API_KEY", "OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            groq: hosted("GROQ_API_KEY", "GROQ_MODEL", DEFAULT_GROQ_MODEL),
            claude: hosted("CLAUDE_API_KEY", "CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
            local_url: lookup("LOCAL_LLM_URL").unwrap_or_else(|| DEFAULT_LOCAL_URL.into()),
            local_model: lookup("LOCAL_LLM_MODEL").unwrap_or_else(|| DEFAULT_LOCAL_MODEL.into()),
            local_enabled,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Register every configured provider into a fallback chain.
///
/// OpenAI is primary when present; Groq, Claude and the local server
/// follow in that order.
pub fn build_fallback_client(config: &ProviderConfig) -> ProviderFallbackClient {
    let timeout = config.timeout();
    let mut client = ProviderFallbackClient::new();

    if let Some(openai) = &config.openai {
        client.add_provider(
            PROVIDER_OPENAI,
            Arc::new(OpenAiCompatProvider::openai(&openai.api_key, &openai.model, timeout)),
            true,
        );
    }
    if let Some(groq) = &config.groq {
        client.add_provider(
            PROVIDER_GROQ,
            Arc::new(OpenAiCompatProvider::groq(&groq.api_key, &groq.model, timeout)),
            false,
        );
    }
    if let Some(claude) = &config.claude {
        client.add_provider(
            PROVIDER_CLAUDE,
            Arc::new(ClaudeProvider::new(&claude.api_key, &claude.model, timeout)),
            false,
        );
    }
    if config.local_enabled {
        client.add_provider(
            PROVIDER_LOCAL,
            Arc::new(LocalLlmProvider::new(&config.local_url, &config.local_model, timeout)),
            false,
        );
    }

    tracing::info!(
        providers = ?client.chain(),
        primary = client.primary().unwrap_or("none"),
        "Generation providers configured",
    );
    client
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // -- from_lookup ------------------------------------------------------------

    #[test]
    fn defaults_when_nothing_set() {
        let config = ProviderConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn blank_key_skips_provider() {
        let config = ProviderConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")]));
        assert!(config.openai.is_none());
    }

    #[test]
    fn hosted_model_override() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gk"),
            ("GROQ_MODEL", "llama3-70b"),
        ]));
        let groq = config.groq.unwrap();
        assert_eq!(groq.api_key, "gk");
        assert_eq!(groq.model, "llama3-70b");
    }

    #[test]
    fn local_disable_and_bad_timeout() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("LOCAL_LLM_ENABLED", "false"),
            ("PROVIDER_TIMEOUT_SECS", "soon"),
        ]));
        assert!(!config.local_enabled);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    // -- build_fallback_client ------------------------------------------------

    #[test]
    fn openai_is_primary_and_chain_order_is_fixed() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("CLAUDE_API_KEY", "ck"),
            ("GROQ_API_KEY", "gk"),
            ("OPENAI_API_KEY", "ok"),
        ]));
        let client = build_fallback_client(&config);
        assert_eq!(client.primary(), Some(PROVIDER_OPENAI));
        assert_eq!(
            client.chain(),
            vec![PROVIDER_OPENAI, PROVIDER_GROQ, PROVIDER_CLAUDE, PROVIDER_LOCAL]
        );
    }

    #[test]
    fn nothing_configured_yields_empty_client() {
        let config = ProviderConfig::from_lookup(lookup(&[("LOCAL_LLM_ENABLED", "0")]));
        let client = build_fallback_client(&config);
        assert!(client.is_empty());
        assert_eq!(client.primary(), None);
    }
}
