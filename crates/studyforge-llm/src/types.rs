//! Request types for the generation proxy.

use serde::{Deserialize, Serialize};

/// Generation provider behind the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Groq,
}

impl Provider {
    /// Name used in user-facing error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Groq => "Groq",
        }
    }

    /// Proxy endpoint path for this provider.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Provider::Anthropic => "/api/analyze-claude",
            Provider::Groq => "/api/analyze-groq",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which system prompt the proxy should pair with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptVersion {
    Structure,
    StudyGuide,
}

/// One streaming generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(rename = "promptVersion")]
    pub prompt_version: PromptVersion,
    #[serde(rename = "maxTokens")]
    pub max_tokens: usize,
    /// Overrides the configured default model when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// How a streaming call ended when no error was surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Full accumulated text, after an explicit done event or a stream end
    /// with content.
    Completed(String),
    /// The cancel token fired; the request was aborted, nothing surfaced.
    Cancelled,
}
