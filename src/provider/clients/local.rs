//! Client for a locally hosted model server (llama.cpp server, LM Studio, ...).
//!
//! Local servers usually ignore authentication, but the client still goes through the
//! credential store so a local provider is configured the same way as any other; a
//! placeholder key is enough.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::provider::backend::{
    Backend, BackendCall, TransportError, TransportErrorKind, map_transport_error,
};
use crate::provider::base::ClientBase;
use crate::provider::{ProviderClient, tokens};
use crate::streaming::ChatStream;
use crate::types::*;

use super::inline_system_prompt;

#[derive(Debug)]
pub struct LocalModelClient {
    base: ClientBase,
}

impl LocalModelClient {
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:8080";

    pub fn new(store: Arc<ConfigurationStore>, backend: Arc<dyn Backend>) -> Self {
        let base = ClientBase::new(
            ProviderId::Local,
            store,
            backend,
            Self::default_capabilities(),
            map_local_error,
        )
        .with_default_endpoint(Self::DEFAULT_ENDPOINT);
        Self { base }
    }

    pub fn default_capabilities() -> ProviderCapabilities {
        ProviderCapabilities::new()
            .with_streaming()
            .with_limits(4096, 32_768)
            .with_model(ModelInfo::new("llama-3-8b", "Llama 3 8B", 8192))
            .with_model(ModelInfo::new("llama-3-70b", "Llama 3 70B", 8192))
            .with_model(ModelInfo::new("mistral-7b", "Mistral 7B", 32_768))
            .with_model(ModelInfo::new("mixtral-8x7b", "Mixtral 8x7B", 32_768))
            .with_model(ModelInfo::new("phi-3", "Phi-3", 4096))
    }

    async fn prepare(&self, request: ChatRequest) -> Result<(BackendCall, ChatRequest), LlmError> {
        let config = self.base.config().await;
        let request = inline_system_prompt(self.base.shape_request(&config, request)?);
        let call = self.base.call(&config, request.model.clone()).await?;
        Ok((call, request))
    }
}

/// A refused connection means the server isn't running, not a flaky network.
fn map_local_error(provider: ProviderId, model: &str, err: TransportError) -> LlmError {
    if err.kind == TransportErrorKind::Connect {
        return LlmError::ProviderUnavailable {
            provider,
            message: format!("local model server is not reachable: {}", err.message),
        };
    }
    map_transport_error(provider, model, err)
}

#[async_trait]
impl ProviderClient for LocalModelClient {
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
            provider: Some(ProviderId::Local),
        })
    }

    fn token_count(&self, text: &str) -> usize {
        tokens::estimate_by_words(text)
    }

    async fn settings(&self) -> ProviderSettings {
        self.base.settings().await
    }
}
