//! Plumbing shared by every concrete client.
//!
//! A [`ClientBase`] resolves the secret and configuration for its provider on every call,
//! enforces the capability guards and runs the backend call with the provider's error
//! mapper. The concrete clients only add what differs per vendor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::backend::{Backend, BackendCall, TransportError, TransportErrorKind};
use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::streaming::ChatStream;
use crate::types::{
    ChatRequest, ChatResponse, ProviderCapabilities, ProviderConfig, ProviderId, ProviderSettings,
};

/// Translates a transport failure for `model` into the shared taxonomy.
pub(crate) type ErrorMapper = fn(ProviderId, &str, TransportError) -> LlmError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) struct ClientBase {
    id: ProviderId,
    store: Arc<ConfigurationStore>,
    backend: Arc<dyn Backend>,
    capabilities: ProviderCapabilities,
    default_endpoint: Option<&'static str>,
    api_version: Option<&'static str>,
    mapper: ErrorMapper,
    timeout: Duration,
}

impl std::fmt::Debug for ClientBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBase")
            .field("provider", &self.id)
            .field("default_endpoint", &self.default_endpoint)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ClientBase {
    pub(crate) fn new(
        id: ProviderId,
        store: Arc<ConfigurationStore>,
        backend: Arc<dyn Backend>,
        capabilities: ProviderCapabilities,
        mapper: ErrorMapper,
    ) -> Self {
        Self {
            id,
            store,
            backend,
            capabilities,
            default_endpoint: None,
            api_version: None,
            mapper,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub(crate) fn with_default_endpoint(mut self, endpoint: &'static str) -> Self {
        self.default_endpoint = Some(endpoint);
        self
    }

    pub(crate) fn with_api_version(mut self, version: &'static str) -> Self {
        self.api_version = Some(version);
        self
    }

    pub(crate) const fn id(&self) -> ProviderId {
        self.id
    }

    pub(crate) const fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    pub(crate) fn map_error(&self, model: &str, err: TransportError) -> LlmError {
        (self.mapper)(self.id, model, err)
    }

    /// A non-empty secret is stored. Reads the credential store only.
    pub(crate) async fn is_configured(&self) -> bool {
        self.store
            .credentials()
            .retrieve(self.id)
            .await
            .is_ok_and(|s| !s.expose_secret().trim().is_empty())
    }

    /// Stored configuration, or the provider defaults.
    pub(crate) async fn config(&self) -> ProviderConfig {
        self.store
            .provider_config(self.id)
            .await
            .unwrap_or_else(|| ProviderConfig::for_provider(self.id))
    }

    async fn secret(&self) -> Result<SecretString, LlmError> {
        let secret = self.store.credentials().retrieve(self.id).await?;
        if secret.expose_secret().trim().is_empty() {
            return Err(LlmError::NoApiKey { provider: self.id });
        }
        Ok(secret)
    }

    fn endpoint(&self, config: &ProviderConfig) -> Option<String> {
        config
            .custom_endpoint
            .as_deref()
            .or(self.default_endpoint)
            .map(|e| e.trim_end_matches('/').to_string())
    }

    pub(crate) async fn settings(&self) -> ProviderSettings {
        let config = self.config().await;
        ProviderSettings {
            endpoint: self.endpoint(&config),
            api_version: self.api_version.map(str::to_string),
            organization_id: config.organization_id,
            headers: config.custom_headers,
            timeout: self.timeout,
            max_retries: 0,
        }
    }

    /// Addressing for one call. `model` is what the backend puts on the wire.
    pub(crate) async fn call(
        &self,
        config: &ProviderConfig,
        model: impl Into<String>,
    ) -> Result<BackendCall, LlmError> {
        let endpoint = self.endpoint(config).ok_or_else(|| LlmError::NotConfigured {
            provider: self.id,
            reason: "no endpoint configured".to_string(),
        })?;
        Ok(BackendCall {
            provider: self.id,
            endpoint,
            model: model.into(),
            secret: self.secret().await?,
            headers: config.custom_headers.clone(),
            organization_id: config.organization_id.clone(),
            api_version: self.api_version.map(str::to_string),
            timeout: self.timeout,
        })
    }

    /// Validate `request` and fill it from `config`.
    ///
    /// Missing model, temperature and max tokens come from the configuration; max tokens
    /// never exceeds the provider's output limit.
    pub(crate) fn shape_request(
        &self,
        config: &ProviderConfig,
        mut request: ChatRequest,
    ) -> Result<ChatRequest, LlmError> {
        request.validate_params()?;
        if request.uses_functions() && !self.capabilities.supports_function_calling {
            return Err(LlmError::FunctionCallingNotSupported { provider: self.id });
        }
        if request.model.trim().is_empty() {
            request.model = config.model.clone();
        }
        if request.temperature.is_none() {
            request.temperature = Some(config.temperature);
        }
        let max_tokens = request.max_tokens.unwrap_or(config.max_tokens);
        request.max_tokens = Some(match self.capabilities.max_tokens {
            0 => max_tokens,
            limit => max_tokens.min(limit),
        });
        Ok(request)
    }

    pub(crate) fn ensure_streaming(&self) -> Result<(), LlmError> {
        if self.capabilities.supports_streaming {
            Ok(())
        } else {
            Err(LlmError::StreamingNotSupported { provider: self.id })
        }
    }

    pub(crate) fn ensure_embeddings(&self) -> Result<(), LlmError> {
        if self.capabilities.supports_embeddings {
            Ok(())
        } else {
            Err(LlmError::EmbeddingsNotSupported {
                provider: Some(self.id),
            })
        }
    }

    pub(crate) async fn complete(
        &self,
        call: &BackendCall,
        request: &ChatRequest,
    ) -> Result<ChatResponse, LlmError> {
        let started = Instant::now();
        let result = self.backend.complete(call, request).await;
        debug!(
            provider = %self.id,
            model = %call.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Chat completion finished"
        );
        let mut response = result.map_err(|e| self.map_error(&call.model, e))?;
        if response.id.is_empty() {
            response.id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
        }
        Ok(response)
    }

    /// Open a stream that ends right after the first chunk carrying a finish reason.
    ///
    /// A backend stream that runs dry before that yields `InvalidResponse`.
    pub(crate) async fn stream(
        &self,
        call: &BackendCall,
        request: &ChatRequest,
    ) -> Result<ChatStream, LlmError> {
        let mut inner = self
            .backend
            .stream(call, request)
            .await
            .map_err(|e| self.map_error(&call.model, e))?;

        let provider = self.id;
        let mapper = self.mapper;
        let model = call.model.clone();
        let s = async_stream::stream! {
            use futures::StreamExt;
            loop {
                match inner.next().await {
                    Some(Ok(chunk)) => {
                        let done = chunk.is_final();
                        yield Ok(chunk);
                        if done {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(mapper(provider, &model, e));
                        break;
                    }
                    None => {
                        yield Err(LlmError::InvalidResponse {
                            provider,
                            message: "stream ended before a finish reason".to_string(),
                        });
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(s))
    }

    pub(crate) async fn embed(&self, call: &BackendCall, input: &str) -> Result<Vec<f32>, LlmError> {
        let vector = self
            .backend
            .embed(call, input)
            .await
            .map_err(|e| self.map_error(&call.model, e))?;
        if vector.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.id,
                message: "empty embedding vector".to_string(),
            });
        }
        Ok(vector)
    }

    /// Probe the API with the stored credential.
    ///
    /// Client-side rejections (4xx other than 429) mean the key was refused.
    pub(crate) async fn validate_credentials(&self, call: &BackendCall) -> Result<(), LlmError> {
        self.backend.probe(call).await.map_err(|e| match e.kind {
            TransportErrorKind::Status(status)
                if (400..500).contains(&status) && status != 429 && status != 408 =>
            {
                LlmError::InvalidCredentials {
                    provider: self.id,
                    message: e.message,
                }
            }
            TransportErrorKind::Connect | TransportErrorKind::Timeout => LlmError::NetworkError {
                provider: self.id,
                message: e.message,
            },
            _ => self.map_error(&call.model, e),
        })
    }
}
