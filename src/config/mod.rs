//! Configuration Store
//!
//! Owns the non-secret per-provider configuration, the active provider and the priority
//! list. All state sits behind one [`tokio::sync::RwLock`]; every mutation holds the write
//! lock for its whole read-modify-write, including the credential and storage calls, so
//! mutations never interleave with each other or with a fallback walk reading the state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::LlmError;
use crate::storage::KeyValueStore;
use crate::types::{ProviderConfig, ProviderId, ProviderPriority};
use crate::utils::mask_sensitive_value;

pub mod persist;

#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigState {
    pub(crate) active: Option<ProviderId>,
    pub(crate) configs: BTreeMap<ProviderId, ProviderConfig>,
    pub(crate) priority: ProviderPriority,
}

/// Point-in-time view of the state that drives one fallback walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub active: Option<ProviderId>,
    pub priority: ProviderPriority,
    pub configured: BTreeSet<ProviderId>,
}

impl ConfigSnapshot {
    /// Priority entries other than `skip` that have a configuration, in priority order.
    pub fn candidates(&self, skip: Option<ProviderId>) -> Vec<ProviderId> {
        self.priority
            .providers()
            .iter()
            .copied()
            .filter(|p| Some(*p) != skip && self.configured.contains(p))
            .collect()
    }
}

pub struct ConfigurationStore {
    state: RwLock<ConfigState>,
    credentials: Arc<dyn CredentialStore>,
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationStore").finish_non_exhaustive()
    }
}

impl ConfigurationStore {
    /// Empty store; nothing is read from `storage`.
    pub fn new(credentials: Arc<dyn CredentialStore>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: RwLock::new(ConfigState::default()),
            credentials,
            storage,
        }
    }

    /// Store populated from `storage`. Missing or corrupt records are skipped, never fatal.
    pub async fn load(
        credentials: Arc<dyn CredentialStore>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let state = persist::read_state(storage.as_ref()).await;
        debug!(
            configured = state.configs.len(),
            active = ?state.active,
            "Loaded provider configuration"
        );
        Self {
            state: RwLock::new(state),
            credentials,
            storage,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Store the secret and configuration for `provider`.
    ///
    /// The first configured provider becomes active. Reconfiguring overwrites the
    /// configuration and leaves the active provider alone.
    pub async fn configure_provider(
        &self,
        provider: ProviderId,
        secret: SecretString,
        config: Option<ProviderConfig>,
    ) -> Result<(), LlmError> {
        if secret.expose_secret().trim().is_empty() {
            return Err(LlmError::InvalidApiKey(format!(
                "empty API key for {}",
                provider.display_name()
            )));
        }
        let mut config = config.unwrap_or_else(|| ProviderConfig::for_provider(provider));
        if config.model.trim().is_empty() {
            config.model = provider.default_model().to_string();
        }
        config.validate_params()?;

        let preview = mask_sensitive_value(secret.expose_secret());
        let mut state = self.state.write().await;

        let mut next = state.clone();
        next.configs.insert(provider, config);
        let activated = next.active.is_none();
        if activated {
            next.active = Some(provider);
        }

        // Records first: a failed write leaves no secret behind without a configuration.
        self.write_records(&state, &next).await?;
        if let Err(e) = self.credentials.store(secret, provider).await {
            self.restore_records(&state).await;
            return Err(e.into());
        }
        debug!(provider = %provider, key = %preview, "Credential stored");
        *state = next;

        if activated {
            info!(provider = %provider, "Provider configured and activated");
        } else {
            info!(provider = %provider, "Provider configured");
        }
        Ok(())
    }

    /// Delete the secret and configuration for `provider`.
    ///
    /// If it was active, the first remaining configured provider (in identity order)
    /// takes over, or no provider is active.
    pub async fn remove_provider(&self, provider: ProviderId) -> Result<(), LlmError> {
        let mut state = self.state.write().await;

        let mut next = state.clone();
        next.configs.remove(&provider);
        if next.active == Some(provider) {
            next.active = next.configs.keys().next().copied();
        }

        self.write_records(&state, &next).await?;
        if let Err(e) = self.credentials.delete(provider).await {
            self.restore_records(&state).await;
            return Err(e.into());
        }

        if state.active == Some(provider) {
            info!(removed = %provider, active = ?next.active, "Active provider removed");
        } else {
            info!(provider = %provider, "Provider removed");
        }
        *state = next;
        Ok(())
    }

    pub async fn set_active_provider(&self, provider: ProviderId) -> Result<(), LlmError> {
        let mut state = self.state.write().await;
        if !state.configs.contains_key(&provider) {
            return Err(LlmError::ProviderUnavailable {
                provider,
                message: "provider is not configured".to_string(),
            });
        }
        if !self.credentials.exists(provider).await {
            return Err(LlmError::NoApiKey { provider });
        }
        persist::write_active(self.storage.as_ref(), Some(provider)).await?;
        state.active = Some(provider);
        info!(provider = %provider, "Active provider changed");
        Ok(())
    }

    /// Replace the priority list and fallback mode. The active provider is unchanged.
    pub async fn update_provider_priority(
        &self,
        priority: ProviderPriority,
    ) -> Result<(), LlmError> {
        let mut state = self.state.write().await;
        persist::write_priority(self.storage.as_ref(), &priority).await?;
        debug!(priority = ?priority.providers(), behavior = ?priority.behavior(), "Priority updated");
        state.priority = priority;
        Ok(())
    }

    /// Configured providers whose credential is present, sorted by identity.
    pub async fn available_providers(&self) -> Vec<ProviderId> {
        let state = self.state.read().await;
        self.available_in(&state).await
    }

    async fn available_in(&self, state: &ConfigState) -> Vec<ProviderId> {
        let mut available = Vec::with_capacity(state.configs.len());
        // BTreeMap keys come out in identity order already.
        for id in state.configs.keys() {
            if self.credentials.exists(*id).await {
                available.push(*id);
            }
        }
        available
    }

    /// The provider after `after` in the priority list, counting only available providers.
    pub async fn next_fallback_provider(&self, after: ProviderId) -> Option<ProviderId> {
        let state = self.state.read().await;
        let available = self.available_in(&state).await;
        let ordered: Vec<ProviderId> = state
            .priority
            .providers()
            .iter()
            .copied()
            .filter(|p| available.contains(p))
            .collect();
        let pos = ordered.iter().position(|p| *p == after)?;
        ordered.get(pos + 1).copied()
    }

    /// Whether each configured provider's credential currently resolves.
    pub async fn validate_all_providers(&self) -> BTreeMap<ProviderId, bool> {
        let state = self.state.read().await;
        let mut report = BTreeMap::new();
        for id in state.configs.keys() {
            let ok = self.credentials.retrieve(*id).await.is_ok_and(|secret| {
                !secret.expose_secret().trim().is_empty()
            });
            report.insert(*id, ok);
        }
        report
    }

    /// Persist the config and active records that differ between `current` and `next`.
    ///
    /// If the active record fails after the config record was written, the config record
    /// is put back.
    async fn write_records(&self, current: &ConfigState, next: &ConfigState) -> Result<(), LlmError> {
        let storage = self.storage.as_ref();
        persist::write_configs(storage, &next.configs).await?;
        if next.active != current.active {
            if let Err(e) = persist::write_active(storage, next.active).await {
                self.restore_records(current).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Best effort: write `state`'s config and active records back after a failed mutation.
    async fn restore_records(&self, state: &ConfigState) {
        let storage = self.storage.as_ref();
        if let Err(e) = persist::write_configs(storage, &state.configs).await {
            warn!(error = %e, "Failed to restore provider configuration record");
        }
        if let Err(e) = persist::write_active(storage, state.active).await {
            warn!(error = %e, "Failed to restore active provider record");
        }
    }

    /// Forget every secret, configuration, the active provider and the priority list.
    pub async fn clear_all_configurations(&self) -> Result<(), LlmError> {
        let mut state = self.state.write().await;
        self.credentials.delete_all().await?;
        persist::clear(self.storage.as_ref()).await?;
        *state = ConfigState::default();
        info!("All provider configuration cleared");
        Ok(())
    }

    pub async fn active_provider(&self) -> Option<ProviderId> {
        self.state.read().await.active
    }

    pub async fn active_provider_config(&self) -> Option<ProviderConfig> {
        let state = self.state.read().await;
        state.active.and_then(|id| state.configs.get(&id).cloned())
    }

    pub async fn provider_config(&self, provider: ProviderId) -> Option<ProviderConfig> {
        self.state.read().await.configs.get(&provider).cloned()
    }

    pub async fn configured_providers(&self) -> Vec<ProviderId> {
        self.state.read().await.configs.keys().copied().collect()
    }

    pub async fn is_provider_configured(&self, provider: ProviderId) -> bool {
        self.state.read().await.configs.contains_key(&provider)
    }

    pub async fn provider_priority(&self) -> ProviderPriority {
        self.state.read().await.priority.clone()
    }

    /// Consistent view of active provider, priority and configured set.
    pub async fn snapshot(&self) -> ConfigSnapshot {
        let state = self.state.read().await;
        ConfigSnapshot {
            active: state.active,
            priority: state.priority.clone(),
            configured: state.configs.keys().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::storage::MemoryKeyValueStore;

    fn store() -> ConfigurationStore {
        ConfigurationStore::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
        )
    }

    #[tokio::test]
    async fn blank_secret_is_rejected() {
        let store = store();
        let err = store
            .configure_provider(ProviderId::OpenAi, "   ".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidApiKey(_)));
        assert!(store.configured_providers().await.is_empty());
        assert!(!store.credentials().exists(ProviderId::OpenAi).await);
    }

    #[tokio::test]
    async fn empty_model_gets_default() {
        let store = store();
        store
            .configure_provider(
                ProviderId::Gemini,
                "g-key".into(),
                Some(ProviderConfig::default()),
            )
            .await
            .unwrap();
        let config = store.provider_config(ProviderId::Gemini).await.unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn snapshot_candidates_follow_priority() {
        let store = store();
        for id in [ProviderId::Gemini, ProviderId::Claude, ProviderId::Local] {
            store.configure_provider(id, "k".into(), None).await.unwrap();
        }
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.active, Some(ProviderId::Gemini));
        // Local is configured but not in the default priority list.
        assert_eq!(
            snapshot.candidates(Some(ProviderId::Gemini)),
            vec![ProviderId::Claude]
        );
    }
}
