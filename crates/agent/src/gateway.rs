//! ModelGateway: one round trip to the language model.
//!
//! The gateway owns the request shape (model, temperature, token cap) and
//! the per-call timeout. It never retries: retry policy is a turn-level
//! decision that belongs to the [`AgentLoop`](crate::AgentLoop).

use parley_core::error::ProviderError;
use parley_core::message::Message;
use parley_core::provider::{ModelResponse, Provider, ProviderRequest, ToolDefinition};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send the transcript and tool schema; classify what comes back.
    ///
    /// An empty `tools` slice means the model is not offered any tools.
    pub async fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: transcript.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
            stop: vec![],
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} did not answer within {}s",
                    self.provider.name(),
                    self.timeout.as_secs_f32()
                ))
            })??;

        if let Some(usage) = &response.usage {
            debug!(
                provider = self.provider.name(),
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Model responded"
            );
        }

        Ok(response.into_model_response())
    }
}
