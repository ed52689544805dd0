//! Chart generation providers and the fallback chain over them.
//!
//! - [`GenerationProvider`]: the capability every backing LLM service
//!   implements (`generate`, `suggest_chart_types`, `validate_chart`).
//! - HTTP implementations for OpenAI-compatible APIs (OpenAI, Groq), the
//!   Claude messages API, and a local Ollama server.
//! - [`ProviderFallbackClient`]: tries providers in chain order until one
//!   succeeds and reports every failure when none does.

pub mod claude;
pub mod config;
pub mod fallback;
mod http;
pub mod local;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use config::{build_fallback_client, ProviderConfig};
pub use fallback::{FallbackError, ProviderFailure, ProviderFallbackClient};
pub use provider::{GenerationProvider, ProviderError};
