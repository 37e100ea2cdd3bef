//! The generation seam: one streaming call per section.
//!
//! The orchestrator only needs "prompt in, full text out, cancel-aware";
//! the trait keeps it testable without a network.

use std::time::Duration;

use async_trait::async_trait;

use studyforge_core::CancelToken;
use studyforge_llm::{stream_generate, GenerationRequest, LlmConfig, StreamError, StreamOutcome};

#[async_trait]
pub trait SectionGenerator: Send + Sync {
    /// Drive one streaming generation request to completion, honoring the
    /// cancel token.
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<StreamOutcome, StreamError>;

    /// Pause between consecutive generation calls so the run stays under
    /// the provider's throughput ceiling.
    fn inter_request_delay(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Production generator over the streaming client.
pub struct LlmGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmGenerator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl SectionGenerator for LlmGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<StreamOutcome, StreamError> {
        stream_generate(&self.client, &self.config, &request, cancel, |_| {}).await
    }

    fn inter_request_delay(&self) -> Duration {
        self.config.inter_request_delay()
    }
}
