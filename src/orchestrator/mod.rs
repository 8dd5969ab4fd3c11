//! Orchestrator
//!
//! Routes chat, streaming and embedding requests to the active provider and walks the
//! priority list when it fails. Configuration changes go through the orchestrator too,
//! so callers only hold one handle.
//!
//! A walk reads the configuration once when it starts. Concurrent reconfiguration is
//! allowed and affects the next request, never one already in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;

use crate::backoff::BackoffPolicy;
use crate::config::ConfigurationStore;
use crate::error::LlmError;
use crate::provider::{ProviderClient, ProviderRegistry, tokens};
use crate::streaming::ChatStreamHandle;
use crate::types::{
    ChatRequest, ChatResponse, ProviderCapabilities, ProviderConfig, ProviderId,
    ProviderPriority,
};
use crate::utils::cancel::{CancelHandle, new_cancel_handle};

mod fallback;
mod health;
mod stream;

use fallback::Operation;
pub use fallback::{FallbackAttempt, FallbackReport, SkipReason};
pub use health::{HealthPolicy, HealthTracker, ProviderHealth};

/// Called for every failed provider attempt, before the walk moves on.
pub type FailureCallback = Arc<dyn Fn(ProviderId, &LlmError) + Send + Sync>;

/// Orchestrator options.
#[derive(Clone, Default)]
pub struct OrchestratorOptions {
    /// Skipping of repeatedly failing fallback candidates.
    pub health: HealthPolicy,
    /// Pause between fallback attempts. `None` moves on immediately.
    pub backoff: Option<BackoffPolicy>,
    pub on_provider_failure: Option<FailureCallback>,
}

impl std::fmt::Debug for OrchestratorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorOptions")
            .field("health", &self.health)
            .field("backoff", &self.backoff)
            .field("on_provider_failure", &self.on_provider_failure.is_some())
            .finish()
    }
}

impl OrchestratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_health_policy(mut self, policy: HealthPolicy) -> Self {
        self.health = policy;
        self
    }

    pub fn without_health_tracking(mut self) -> Self {
        self.health = HealthPolicy::disabled();
        self
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = Some(policy);
        self
    }

    pub fn on_provider_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(ProviderId, &LlmError) + Send + Sync + 'static,
    {
        self.on_provider_failure = Some(Arc::new(f));
        self
    }
}

/// Request router with fallback across providers.
///
/// Cheap to clone; clones share configuration, clients and health statistics.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<ConfigurationStore>,
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    options: OrchestratorOptions,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(store: Arc<ConfigurationStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self::with_options(store, registry, OrchestratorOptions::default())
    }

    pub fn with_options(
        store: Arc<ConfigurationStore>,
        registry: Arc<ProviderRegistry>,
        options: OrchestratorOptions,
    ) -> Self {
        let health = Arc::new(HealthTracker::new(options.health.clone()));
        Self {
            store,
            registry,
            health,
            options,
        }
    }

    pub fn store(&self) -> &Arc<ConfigurationStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    // -- Chat -------------------------------------------------------------------------

    /// Complete `request` with the active provider, falling back in priority order.
    ///
    /// When every attempted provider fails, the active provider's error is returned.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.chat_completion_with_report(request, &new_cancel_handle())
            .await
            .map(|(response, _)| response)
    }

    pub async fn chat_completion_with_cancel(
        &self,
        request: ChatRequest,
        cancel: &CancelHandle,
    ) -> Result<ChatResponse, LlmError> {
        self.chat_completion_with_report(request, cancel)
            .await
            .map(|(response, _)| response)
    }

    /// Like [`chat_completion`](Self::chat_completion), also describing which providers
    /// were tried.
    pub async fn chat_completion_with_report(
        &self,
        request: ChatRequest,
        cancel: &CancelHandle,
    ) -> Result<(ChatResponse, FallbackReport), LlmError> {
        request.validate_params()?;
        self.run_walk(Operation::Chat, cancel, |client| {
            let request = request.clone();
            async move { client.chat_completion(request).await }
        })
        .await
    }

    // -- Embeddings -------------------------------------------------------------------

    /// Embed `text` with the active provider, or with the first ready provider in
    /// priority order that supports embeddings.
    pub async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.generate_embeddings_with_cancel(text, &new_cancel_handle())
            .await
    }

    pub async fn generate_embeddings_with_cancel(
        &self,
        text: &str,
        cancel: &CancelHandle,
    ) -> Result<Vec<f32>, LlmError> {
        self.generate_embeddings_with_report(text, cancel)
            .await
            .map(|(vector, _)| vector)
    }

    pub async fn generate_embeddings_with_report(
        &self,
        text: &str,
        cancel: &CancelHandle,
    ) -> Result<(Vec<f32>, FallbackReport), LlmError> {
        if text.is_empty() {
            return Err(LlmError::InvalidParameter(
                "cannot embed empty text".to_string(),
            ));
        }
        let text: Arc<str> = Arc::from(text);
        self.run_walk(Operation::Embeddings, cancel, |client| {
            let text = text.clone();
            async move { client.generate_embeddings(&text).await }
        })
        .await
    }

    // -- Misc -------------------------------------------------------------------------

    /// Token estimate from the active provider, or a characters/4 guess without one.
    pub async fn token_count(&self, text: &str) -> usize {
        match self.store.active_provider().await {
            Some(id) => self.registry.get(id).token_count(text),
            None => tokens::default_estimate(text),
        }
    }

    pub fn capabilities(&self, provider: ProviderId) -> ProviderCapabilities {
        self.registry.get(provider).capabilities().clone()
    }

    /// Live credential check of every available provider.
    pub async fn validate_providers(&self) -> BTreeMap<ProviderId, Result<(), LlmError>> {
        let mut results = BTreeMap::new();
        for id in self.store.available_providers().await {
            let outcome = self.registry.get(id).validate_credentials().await;
            if let Err(e) = &outcome {
                debug!(provider = %id, error = %e, "Credential check failed");
            }
            results.insert(id, outcome);
        }
        results
    }

    pub fn health(&self, provider: ProviderId) -> Option<ProviderHealth> {
        self.health.get(provider)
    }

    pub fn health_snapshot(&self) -> BTreeMap<ProviderId, ProviderHealth> {
        self.health.snapshot()
    }

    pub fn reset_health(&self, provider: ProviderId) {
        self.health.reset(provider);
    }

    // -- Configuration ----------------------------------------------------------------

    pub async fn configure_provider(
        &self,
        provider: ProviderId,
        secret: SecretString,
        config: Option<ProviderConfig>,
    ) -> Result<(), LlmError> {
        self.store
            .configure_provider(provider, secret, config)
            .await?;
        // A fresh credential deserves a fresh chance.
        self.health.reset(provider);
        Ok(())
    }

    pub async fn remove_provider(&self, provider: ProviderId) -> Result<(), LlmError> {
        self.store.remove_provider(provider).await?;
        self.health.reset(provider);
        Ok(())
    }

    pub async fn set_active_provider(&self, provider: ProviderId) -> Result<(), LlmError> {
        self.store.set_active_provider(provider).await
    }

    pub async fn update_provider_priority(&self, priority: ProviderPriority) -> Result<(), LlmError> {
        self.store.update_provider_priority(priority).await
    }

    pub async fn active_provider(&self) -> Option<ProviderId> {
        self.store.active_provider().await
    }

    pub async fn provider_priority(&self) -> ProviderPriority {
        self.store.provider_priority().await
    }

    pub async fn available_providers(&self) -> Vec<ProviderId> {
        self.store.available_providers().await
    }

    pub async fn next_fallback_provider(&self, after: ProviderId) -> Option<ProviderId> {
        self.store.next_fallback_provider(after).await
    }

    pub async fn validate_all_providers(&self) -> BTreeMap<ProviderId, bool> {
        self.store.validate_all_providers().await
    }

    pub async fn clear_all_configurations(&self) -> Result<(), LlmError> {
        self.store.clear_all_configurations().await?;
        self.health.reset_all();
        Ok(())
    }
}

impl Orchestrator {
    /// Stream a completion, falling back in priority order. See
    /// [`stream_chat_completion_with_cancel`](Self::stream_chat_completion_with_cancel).
    pub async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<ChatStreamHandle, LlmError> {
        self.stream_chat_completion_with_cancel(request, new_cancel_handle())
            .await
    }
}
