//! Client for a user-supplied OpenAI-compatible endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::provider::backend::{Backend, BackendCall};
use crate::provider::base::ClientBase;
use crate::provider::{ProviderClient, tokens};
use crate::streaming::ChatStream;
use crate::types::*;

use super::inline_system_prompt;
use super::openai::map_openai_error;

/// Custom provider. Has no default endpoint; `custom_endpoint` must be set.
#[derive(Debug)]
pub struct CustomClient {
    base: ClientBase,
}

impl CustomClient {
    pub fn new(store: Arc<ConfigurationStore>, backend: Arc<dyn Backend>) -> Self {
        let base = ClientBase::new(
            ProviderId::Custom,
            store,
            backend,
            Self::default_capabilities(),
            map_openai_error,
        );
        Self { base }
    }

    /// Conservative defaults: nothing beyond chat, streaming and function calling is assumed.
    pub fn default_capabilities() -> ProviderCapabilities {
        ProviderCapabilities::new()
            .with_streaming()
            .with_function_calling()
            .with_limits(4096, 32_768)
            .with_model(ModelInfo::new("custom-model", "Custom Model", 32_768))
    }

    async fn prepare(&self, request: ChatRequest) -> Result<(BackendCall, ChatRequest), LlmError> {
        let config = self.base.config().await;
        let request = inline_system_prompt(self.base.shape_request(&config, request)?);
        let call = self.base.call(&config, request.model.clone()).await?;
        Ok((call, request))
    }
}

#[async_trait]
impl ProviderClient for CustomClient {
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
            provider: Some(ProviderId::Custom),
        })
    }

    fn token_count(&self, text: &str) -> usize {
        tokens::estimate_by_chars(text, 4.0)
    }

    async fn settings(&self) -> ProviderSettings {
        self.base.settings().await
    }
}
