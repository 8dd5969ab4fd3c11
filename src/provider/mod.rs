//! Provider clients.
//!
//! [`ProviderClient`] is the capability contract every backend integration fulfils.
//! The set of backends is closed: [`Provider`] has one variant per [`ProviderId`] and
//! dispatches with a `match`, and [`ProviderRegistry`] holds exactly one of each.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::streaming::ChatStream;
use crate::types::{
    ChatRequest, ChatResponse, ProviderCapabilities, ProviderId, ProviderSettings,
};

pub mod backend;
pub(crate) mod base;
pub mod clients;
pub mod registry;
pub mod tokens;

pub use backend::{
    Backend, BackendCall, ChunkStream, TransportError, TransportErrorKind, UnconfiguredBackend,
    map_transport_error,
};
pub use clients::*;
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};

/// Uniform contract of one LLM backend.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn id(&self) -> ProviderId;

    fn display_name(&self) -> &'static str {
        self.id().display_name()
    }

    fn capabilities(&self) -> &ProviderCapabilities;

    /// A non-empty secret is stored for this provider. No network traffic.
    async fn is_configured(&self) -> bool;

    /// Lightweight live call with the stored credential.
    ///
    /// A rejected key is `InvalidCredentials`; an unreachable API is `NetworkError`.
    async fn validate_credentials(&self) -> Result<(), LlmError>;

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Lazy, finite stream. It ends after the chunk with a finish reason, or with an error.
    /// Dropping it drops the underlying transport.
    async fn stream_chat_completion(&self, request: ChatRequest) -> Result<ChatStream, LlmError>;

    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Best-effort estimate, never authoritative.
    fn token_count(&self, text: &str) -> usize;

    async fn settings(&self) -> ProviderSettings;
}

/// One concrete client per provider identity.
#[derive(Debug)]
pub enum Provider {
    AzureOpenAi(AzureOpenAiClient),
    Claude(ClaudeClient),
    Custom(CustomClient),
    Gemini(GeminiClient),
    Local(LocalModelClient),
    OpenAi(OpenAiClient),
}

macro_rules! dispatch {
    ($self:ident, $client:ident => $body:expr) => {
        match $self {
            Provider::AzureOpenAi($client) => $body,
            Provider::Claude($client) => $body,
            Provider::Custom($client) => $body,
            Provider::Gemini($client) => $body,
            Provider::Local($client) => $body,
            Provider::OpenAi($client) => $body,
        }
    };
}

impl Provider {
    /// Build the client for `id`.
    pub fn new(
        id: ProviderId,
        store: std::sync::Arc<crate::config::ConfigurationStore>,
        backend: std::sync::Arc<dyn Backend>,
    ) -> Self {
        match id {
            ProviderId::AzureOpenAi => Self::AzureOpenAi(AzureOpenAiClient::new(store, backend)),
            ProviderId::Claude => Self::Claude(ClaudeClient::new(store, backend)),
            ProviderId::Custom => Self::Custom(CustomClient::new(store, backend)),
            ProviderId::Gemini => Self::Gemini(GeminiClient::new(store, backend)),
            ProviderId::Local => Self::Local(LocalModelClient::new(store, backend)),
            ProviderId::OpenAi => Self::OpenAi(OpenAiClient::new(store, backend)),
        }
    }
}

#[async_trait]
impl ProviderClient for Provider {
    fn id(&self) -> ProviderId {
        dispatch!(self, c => c.id())
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        dispatch!(self, c => c.capabilities())
    }

    async fn is_configured(&self) -> bool {
        dispatch!(self, c => c.is_configured().await)
    }

    async fn validate_credentials(&self) -> Result<(), LlmError> {
        dispatch!(self, c => c.validate_credentials().await)
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        dispatch!(self, c => c.chat_completion(request).await)
    }

    async fn stream_chat_completion(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
        dispatch!(self, c => c.stream_chat_completion(request).await)
    }

    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        dispatch!(self, c => c.generate_embeddings(text).await)
    }

    fn token_count(&self, text: &str) -> usize {
        dispatch!(self, c => c.token_count(text))
    }

    async fn settings(&self) -> ProviderSettings {
        dispatch!(self, c => c.settings().await)
    }
}
