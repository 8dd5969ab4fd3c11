//! Google Gemini client.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::provider::backend::{Backend, BackendCall, TransportError, map_transport_error};
use crate::provider::base::ClientBase;
use crate::provider::{ProviderClient, tokens};
use crate::streaming::ChatStream;
use crate::types::*;

use super::hoist_system_messages;

#[derive(Debug)]
pub struct GeminiClient {
    base: ClientBase,
}

impl GeminiClient {
    pub const DEFAULT_ENDPOINT: &'static str = "https://generativelanguage.googleapis.com/v1beta";
    pub const EMBEDDING_MODEL: &'static str = "models/text-embedding-004";

    pub fn new(store: Arc<ConfigurationStore>, backend: Arc<dyn Backend>) -> Self {
        let base = ClientBase::new(
            ProviderId::Gemini,
            store,
            backend,
            Self::default_capabilities(),
            map_gemini_error,
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
            .with_limits(8192, 1_000_000)
            .with_model(
                ModelInfo::new("gemini-2.0-flash-exp", "Gemini 2.0 Flash", 1_000_000)
                    .with_description("Experimental"),
            )
            .with_model(
                ModelInfo::new("gemini-1.5-pro", "Gemini 1.5 Pro", 2_000_000)
                    .with_pricing(0.001_25, 0.005),
            )
            .with_model(
                ModelInfo::new("gemini-1.5-flash", "Gemini 1.5 Flash", 1_000_000)
                    .with_pricing(0.000_075, 0.0003),
            )
    }

    async fn prepare(&self, request: ChatRequest) -> Result<(BackendCall, ChatRequest), LlmError> {
        let config = self.base.config().await;
        // generateContent carries the system prompt as `systemInstruction`.
        let request = hoist_system_messages(self.base.shape_request(&config, request)?);
        let call = self.base.call(&config, request.model.clone()).await?;
        Ok((call, request))
    }
}

/// Gemini reports a bad key as 400 `API_KEY_INVALID` and quota as `RESOURCE_EXHAUSTED`.
fn map_gemini_error(provider: ProviderId, model: &str, err: TransportError) -> LlmError {
    if err.code_is("API_KEY_INVALID") || err.code_is("PERMISSION_DENIED") {
        return LlmError::InvalidCredentials {
            provider,
            message: err.message,
        };
    }
    if err.code_is("RESOURCE_EXHAUSTED") {
        return LlmError::RateLimitExceeded {
            provider,
            retry_after: err.retry_after,
        };
    }
    if err.code_is("INVALID_ARGUMENT") && err.message.contains("exceeds the maximum number of tokens")
    {
        return LlmError::ContextLengthExceeded {
            provider,
            message: err.message,
        };
    }
    if err.code_is("NOT_FOUND") {
        return LlmError::ModelNotSupported {
            provider,
            model: model.to_string(),
        };
    }
    map_transport_error(provider, model, err)
}

#[async_trait]
impl ProviderClient for GeminiClient {
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
