//! StudyForge LLM — streaming client for the generation proxy.
//!
//! One request per section, consumed as a line-oriented `data: <json>`
//! event stream. Transport failures are classified (spending limit, rate
//! limit, overloaded, other) and the retryable classes back off
//! exponentially. Cancellation aborts the in-flight call and resolves
//! silently.

pub mod client;
pub mod config;
pub mod health;
pub mod types;

pub use client::{classify_error, stream_generate, ErrorClass, StreamError};
pub use config::{LlmConfig, ANTHROPIC_MODELS, GROQ_MODELS};
pub use health::{check_health, HealthStatus, ProviderHealth};
pub use types::{GenerationRequest, PromptVersion, Provider, StreamOutcome};
