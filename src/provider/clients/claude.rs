//! Anthropic Claude client.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::provider::backend::{Backend, TransportError, map_transport_error};
use crate::provider::base::ClientBase;
use crate::provider::{ProviderClient, tokens};
use crate::streaming::ChatStream;
use crate::types::*;

use super::hoist_system_messages;

/// Claude Client
#[derive(Debug)]
pub struct ClaudeClient {
    base: ClientBase,
}

impl ClaudeClient {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.anthropic.com/v1";
    pub const API_VERSION: &'static str = "2023-06-01";

    pub fn new(store: Arc<ConfigurationStore>, backend: Arc<dyn Backend>) -> Self {
        let base = ClientBase::new(
            ProviderId::Claude,
            store,
            backend,
            Self::default_capabilities(),
            map_claude_error,
        )
        .with_default_endpoint(Self::DEFAULT_ENDPOINT)
        .with_api_version(Self::API_VERSION);
        Self { base }
    }

    pub fn default_capabilities() -> ProviderCapabilities {
        ProviderCapabilities::new()
            .with_streaming()
            .with_vision()
            .with_function_calling()
            .with_limits(4096, 200_000)
            .with_model(
                ModelInfo::new("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", 200_000)
                    .with_description("Most capable Claude model for everyday work")
                    .with_pricing(0.003, 0.015),
            )
            .with_model(
                ModelInfo::new("claude-3-opus-20240229", "Claude 3 Opus", 200_000)
                    .with_pricing(0.015, 0.075),
            )
            .with_model(
                ModelInfo::new("claude-3-haiku-20240307", "Claude 3 Haiku", 200_000)
                    .with_description("Fastest and cheapest Claude model")
                    .with_pricing(0.00025, 0.00125),
            )
    }

    async fn prepare(
        &self,
        request: ChatRequest,
    ) -> Result<(crate::provider::BackendCall, ChatRequest), LlmError> {
        let config = self.base.config().await;
        // The Messages API takes the system prompt as its own field.
        let request = hoist_system_messages(self.base.shape_request(&config, request)?);
        let call = self.base.call(&config, request.model.clone()).await?;
        Ok((call, request))
    }
}

/// Anthropic reports overload as 529 and context overflow as a plain 400.
fn map_claude_error(provider: ProviderId, model: &str, err: TransportError) -> LlmError {
    if err.status_code() == Some(529) || err.code_is("overloaded_error") {
        return LlmError::RateLimitExceeded {
            provider,
            retry_after: err.retry_after,
        };
    }
    if err.code_is("authentication_error") || err.code_is("permission_error") {
        return LlmError::InvalidCredentials {
            provider,
            message: err.message,
        };
    }
    if err.status_code() == Some(400) && err.message.contains("prompt is too long") {
        return LlmError::ContextLengthExceeded {
            provider,
            message: err.message,
        };
    }
    if err.code_is("not_found_error") {
        return LlmError::ModelNotSupported {
            provider,
            model: model.to_string(),
        };
    }
    map_transport_error(provider, model, err)
}

#[async_trait]
impl ProviderClient for ClaudeClient {
    fn id(&self) -> ProviderId {
        self.base.id()
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        self.base.capabilities()
    }

    async fn is_configured(&self) -> bool {
        self.base.is_configured().await
    }

    async fn validate_credentials(&self) -> Result<(), LlmError> {
        let config = self.base.config().await;
        let call = self.base.call(&config, config.model.clone()).await?;
        self.base.validate_credentials(&call).await
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let (call, request) = self.prepare(request).await?;
        self.base.complete(&call, &request).await
    }

    async fn stream_chat_completion(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
        self.base.ensure_streaming()?;
        let (call, request) = self.prepare(request).await?;
        self.base.stream(&call, &request).await
    }

    async fn generate_embeddings(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::EmbeddingsNotSupported {
            provider: Some(ProviderId::Claude),
        })
    }

    fn token_count(&self, text: &str) -> usize {
        tokens::estimate_by_chars(text, 3.5)
    }

    async fn settings(&self) -> ProviderSettings {
        self.base.settings().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overloaded_is_rate_limited() {
        let err = map_claude_error(
            ProviderId::Claude,
            "claude-3-5-sonnet-20241022",
            TransportError::status(529, "Overloaded"),
        );
        assert!(matches!(err, LlmError::RateLimitExceeded { .. }));
        assert!(err.is_fallback_eligible());
    }

    #[test]
    fn long_prompt_is_context_overflow() {
        let err = map_claude_error(
            ProviderId::Claude,
            "claude-3-5-sonnet-20241022",
            TransportError::status(400, "prompt is too long: 210000 tokens > 200000 maximum")
                .with_code("invalid_request_error"),
        );
        assert!(matches!(err, LlmError::ContextLengthExceeded { .. }));
    }

    #[test]
    fn capabilities() {
        let caps = ClaudeClient::default_capabilities();
        assert!(caps.supports_streaming);
        assert!(!caps.supports_embeddings);
        assert_eq!(caps.max_context_length, 200_000);
    }
}
