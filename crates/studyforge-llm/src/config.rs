//! Provider configuration and model catalogs.

use std::time::Duration;

use crate::types::Provider;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3058";

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-haiku-4-5-20251001",
    "claude-sonnet-4-20250514",
    "claude-sonnet-4-5-20250929",
];
pub const GROQ_MODELS: &[&str] = &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"];

/// Client configuration for one provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub provider: Provider,
    pub model: String,
    pub max_tokens: usize,
}

impl LlmConfig {
    /// Defaults for a provider; base URL overridable via STUDYFORGE_LLM_URL.
    pub fn for_provider(provider: Provider) -> Self {
        let model = match provider {
            Provider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Provider::Groq => DEFAULT_GROQ_MODEL,
        };
        Self {
            base_url: std::env::var("STUDYFORGE_LLM_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            provider,
            model: model.to_string(),
            max_tokens: 4096,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.provider.endpoint_path())
    }

    pub fn available_models(&self) -> &'static [&'static str] {
        match self.provider {
            Provider::Anthropic => ANTHROPIC_MODELS,
            Provider::Groq => GROQ_MODELS,
        }
    }

    /// Pause between consecutive generation calls. Groq's free tier has a
    /// low tokens-per-minute ceiling, so it gets the long delay.
    pub fn inter_request_delay(&self) -> Duration {
        match self.provider {
            Provider::Anthropic => Duration::from_secs(1),
            Provider::Groq => Duration::from_secs(5),
        }
    }

    /// Sampling budget (tokens) for the structure-detection prompt.
    pub fn structure_sample_tokens(&self) -> usize {
        match self.provider {
            Provider::Anthropic => 8000,
            Provider::Groq => 2500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let mut config = LlmConfig::for_provider(Provider::Anthropic);
        config.base_url = "http://example:3058".into();
        assert_eq!(config.endpoint(), "http://example:3058/api/analyze-claude");
    }

    #[test]
    fn test_provider_defaults() {
        let config = LlmConfig::for_provider(Provider::Groq);
        assert_eq!(config.model, DEFAULT_GROQ_MODEL);
        assert_eq!(config.inter_request_delay(), Duration::from_secs(5));
        assert_eq!(config.structure_sample_tokens(), 2500);
    }
}
