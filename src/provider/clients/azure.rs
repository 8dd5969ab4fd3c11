//! Azure OpenAI client.
//!
//! Azure addresses models through deployments on a per-resource endpoint, so both the
//! endpoint and the deployment name must be configured. Deployment names travel in the
//! provider configuration's custom headers.

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
pub struct AzureOpenAiClient {
    base: ClientBase,
}

impl AzureOpenAiClient {
    pub const API_VERSION: &'static str = "2024-02-15-preview";
    pub const DEPLOYMENT_HEADER: &'static str = "X-Azure-Deployment-Name";
    pub const EMBEDDING_DEPLOYMENT_HEADER: &'static str = "X-Azure-Embedding-Deployment-Name";

    pub fn new(store: Arc<ConfigurationStore>, backend: Arc<dyn Backend>) -> Self {
        let base = ClientBase::new(
            ProviderId::AzureOpenAi,
            store,
            backend,
            Self::default_capabilities(),
            map_azure_error,
        )
        .with_api_version(Self::API_VERSION);
        Self { base }
    }

    pub fn default_capabilities() -> ProviderCapabilities {
        ProviderCapabilities::new()
            .with_streaming()
            .with_embeddings()
            .with_vision()
            .with_function_calling()
            .with_limits(4096, 128_000)
            .with_model(ModelInfo::new(
                "gpt-4-turbo-2024-04-09",
                "GPT-4 Turbo",
                128_000,
            ))
            .with_model(ModelInfo::new("gpt-4-32k", "GPT-4 32K", 32_768))
            .with_model(ModelInfo::new("gpt-35-turbo", "GPT-3.5 Turbo", 16_385))
            .with_model(ModelInfo::new("gpt-4o", "GPT-4o", 128_000))
    }

    fn deployment(&self, config: &ProviderConfig, header: &str) -> Result<String, LlmError> {
        config
            .custom_headers
            .get(header)
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LlmError::NotConfigured {
                provider: ProviderId::AzureOpenAi,
                reason: format!("missing deployment name header '{header}'"),
            })
    }

    async fn prepare(&self, request: ChatRequest) -> Result<(BackendCall, ChatRequest), LlmError> {
        let config = self.base.config().await;
        let deployment = self.deployment(&config, Self::DEPLOYMENT_HEADER)?;
        let request = inline_system_prompt(self.base.shape_request(&config, request)?);
        let call = self.base.call(&config, deployment).await?;
        Ok((call, request))
    }
}

fn map_azure_error(provider: ProviderId, model: &str, err: TransportError) -> LlmError {
    if err.code_is("DeploymentNotFound") {
        return LlmError::ModelNotSupported {
            provider,
            model: model.to_string(),
        };
    }
    if err.code_is("context_length_exceeded") {
        return LlmError::ContextLengthExceeded {
            provider,
            message: err.message,
        };
    }
    if err.code_is("content_filter") {
        return LlmError::InvalidResponse {
            provider,
            message: format!("blocked by content filter: {}", err.message),
        };
    }
    map_transport_error(provider, model, err)
}

#[async_trait]
impl ProviderClient for AzureOpenAiClient {
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
        let deployment = self.deployment(&config, Self::DEPLOYMENT_HEADER)?;
        let call = self.base.call(&config, deployment).await?;
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
        let deployment = self.deployment(&config, Self::EMBEDDING_DEPLOYMENT_HEADER)?;
        let call = self.base.call(&config, deployment).await?;
        self.base.embed(&call, text).await
    }

    fn token_count(&self, text: &str) -> usize {
        tokens::estimate_by_chars(text, 4.0)
    }

    async fn settings(&self) -> ProviderSettings {
        self.base.settings().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::provider::backend::UnconfiguredBackend;
    use crate::storage::MemoryKeyValueStore;

    async fn client_with(config: ProviderConfig) -> AzureOpenAiClient {
        let store = Arc::new(ConfigurationStore::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
        ));
        store
            .configure_provider(ProviderId::AzureOpenAi, "azure-key".into(), Some(config))
            .await
            .unwrap();
        AzureOpenAiClient::new(store, Arc::new(UnconfiguredBackend))
    }

    #[tokio::test]
    async fn missing_deployment_is_not_configured() {
        let client = client_with(
            ProviderConfig::for_provider(ProviderId::AzureOpenAi)
                .with_endpoint("https://example.openai.azure.com"),
        )
        .await;
        let err = client
            .chat_completion(ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured { reason, .. } if reason.contains("X-Azure-Deployment-Name")));
    }

    #[tokio::test]
    async fn missing_endpoint_is_not_configured() {
        let client = client_with(
            ProviderConfig::for_provider(ProviderId::AzureOpenAi)
                .with_header(AzureOpenAiClient::DEPLOYMENT_HEADER, "gpt4o-prod"),
        )
        .await;
        let err = client
            .chat_completion(ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured { reason, .. } if reason.contains("endpoint")));
    }

    #[test]
    fn deployment_not_found_maps_to_model() {
        let err = map_azure_error(
            ProviderId::AzureOpenAi,
            "gpt4o-prod",
            TransportError::status(404, "The API deployment for this resource does not exist")
                .with_code("DeploymentNotFound"),
        );
        assert_eq!(
            err,
            LlmError::ModelNotSupported {
                provider: ProviderId::AzureOpenAi,
                model: "gpt4o-prod".into()
            }
        );
    }
}
