//! LLM provider implementations.
//!
//! Exactly one provider backs a run; [`build_provider`] picks it from the
//! configured [`ProviderKind`].

pub mod gemini;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

pub use super::client::LlmProvider;
use crate::error::LlmError;

/// Which backend serves generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GOOGLE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => openai::DEFAULT_BASE_URL,
            ProviderKind::Gemini => gemini::DEFAULT_BASE_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown provider '{other}', expected openai or gemini")),
        }
    }
}

/// Everything a provider needs to be constructed. No ambient environment reads.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Settings with the provider's default model and endpoint.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            model: kind.default_model().to_string(),
            base_url: kind.default_base_url().to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// API key with the middle elided, for logs.
    pub fn api_key_masked(&self) -> String {
        mask_key(&self.api_key)
    }
}

pub(crate) fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

/// Constructs the provider selected by `settings.kind`.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider: Arc<dyn LlmProvider> = match settings.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_settings(settings)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_settings(settings)?),
    };
    tracing::info!(
        provider = provider.name(),
        model = %settings.model,
        api_key = %settings.api_key_masked(),
        "LLM provider configured"
    );
    Ok(provider)
}
