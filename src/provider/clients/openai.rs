//! OpenAI client.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::provider::backend::{Backend, BackendCall, TransportError, map_transport_error};
use crate::provider::base::ClientBase;
use crate::provider::{ProviderClient, tokens};
use crate::streaming::ChatStream;
use crate::types::*;

use super::inline_system_prompt;

#[derive(Debug)]
pub struct OpenAiClient {
    base: ClientBase,
}

impl OpenAiClient {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";
    pub const EMBEDDING_MODEL: &'static str = "text-embedding-3-small";

    pub fn new(store: Arc<ConfigurationStore>, backend: Arc<dyn Backend>) -> Self {
        let base = ClientBase::new(
            ProviderId::OpenAi,
            store,
            backend,
            Self::default_capabilities(),
            map_openai_error,
        )
        .with_default_endpoint(Self::DEFAULT_ENDPOINT);
        Self { base }
    }

    pub fn default_capabilities() -> ProviderCapabilities {
        ProviderCapabilities::new()
            .with_streaming()
            .with_embeddings()
            .with_vision()
            .with_function_calling()
            .with_limits(4096, 128_000)
            .with_model(
                ModelInfo::new("gpt-4-turbo-preview", "GPT-4 Turbo", 128_000)
                    .with_pricing(0.01, 0.03),
            )
            .with_model(ModelInfo::new("gpt-4", "GPT-4", 8192).with_pricing(0.03, 0.06))
            .with_model(
                ModelInfo::new("gpt-3.5-turbo", "GPT-3.5 Turbo", 16_385)
                    .with_pricing(0.0005, 0.0015),
            )
            .with_model(
                ModelInfo::new("gpt-4o", "GPT-4o", 128_000)
                    .with_description("Multimodal flagship model")
                    .with_pricing(0.005, 0.015),
            )
            .with_model(
                ModelInfo::new("gpt-4o-mini", "GPT-4o mini", 128_000)
                    .with_pricing(0.000_15, 0.0006),
            )
    }

    async fn prepare(&self, request: ChatRequest) -> Result<(BackendCall, ChatRequest), LlmError> {
        let config = self.base.config().await;
        let request = inline_system_prompt(self.base.shape_request(&config, request)?);
        let call = self.base.call(&config, request.model.clone()).await?;
        Ok((call, request))
    }
}

/// Error codes from the OpenAI error body. Also used for OpenAI-compatible servers.
pub(crate) fn map_openai_error(provider: ProviderId, model: &str, err: TransportError) -> LlmError {
    if err.code_is("context_length_exceeded") || err.code_is("string_above_max_length") {
        return LlmError::ContextLengthExceeded {
            provider,
            message: err.message,
        };
    }
    if err.code_is("model_not_found") {
        return LlmError::ModelNotSupported {
            provider,
            model: model.to_string(),
        };
    }
    if err.code_is("invalid_api_key") {
        return LlmError::InvalidCredentials {
            provider,
            message: err.message,
        };
    }
    if err.code_is("rate_limit_exceeded") || err.code_is("insufficient_quota") {
        return LlmError::RateLimitExceeded {
            provider,
            retry_after: err.retry_after,
        };
    }
    map_transport_error(provider, model, err)
}

#[async_trait]
impl ProviderClient for OpenAiClient {
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

    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.base.ensure_embeddings()?;
        let config = self.base.config().await;
        let call = self.base.call(&config, Self::EMBEDDING_MODEL).await?;
        self.base.embed(&call, text).await
    }

    fn token_count(&self, text: &str) -> usize {
        tokens::estimate_by_chars(text, 4.0)
    }

    async fn settings(&self) -> ProviderSettings {
        self.base.settings().await
    }
}
