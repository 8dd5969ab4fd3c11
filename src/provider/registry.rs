//! Provider Registry
//!
//! Holds exactly one client per [`ProviderId`] for its whole lifetime. Lookups index a
//! fixed array, so there is no "provider not found" at runtime.

use std::sync::Arc;

use super::{Backend, Provider, ProviderClient, UnconfiguredBackend};
use crate::config::ConfigurationStore;
use crate::types::ProviderId;

#[derive(Debug)]
pub struct ProviderRegistry {
    clients: [Arc<Provider>; 6],
}

impl ProviderRegistry {
    pub fn builder(store: Arc<ConfigurationStore>) -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new(store)
    }

    pub fn get(&self, id: ProviderId) -> Arc<Provider> {
        self.clients[id.index()].clone()
    }

    /// All clients in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.clients.iter()
    }

    /// Providers whose static capabilities include embeddings.
    pub fn embedding_capable(&self) -> Vec<ProviderId> {
        self.iter()
            .filter(|c| c.capabilities().supports_embeddings)
            .map(|c| c.id())
            .collect()
    }
}

/// Assigns a [`Backend`] per provider. Providers without one get `default_backend`, or
/// [`UnconfiguredBackend`] if that is unset too.
pub struct ProviderRegistryBuilder {
    store: Arc<ConfigurationStore>,
    backends: [Option<Arc<dyn Backend>>; 6],
    default_backend: Option<Arc<dyn Backend>>,
}

impl ProviderRegistryBuilder {
    pub fn new(store: Arc<ConfigurationStore>) -> Self {
        Self {
            store,
            backends: Default::default(),
            default_backend: None,
        }
    }

    pub fn backend(mut self, id: ProviderId, backend: Arc<dyn Backend>) -> Self {
        self.backends[id.index()] = Some(backend);
        self
    }

    pub fn default_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.default_backend = Some(backend);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        let Self {
            store,
            mut backends,
            default_backend,
        } = self;
        let fallback: Arc<dyn Backend> =
            default_backend.unwrap_or_else(|| Arc::new(UnconfiguredBackend));
        let clients = ProviderId::ALL.map(|id| {
            let backend = backends[id.index()]
                .take()
                .unwrap_or_else(|| fallback.clone());
            Arc::new(Provider::new(id, store.clone(), backend))
        });
        ProviderRegistry { clients }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::storage::MemoryKeyValueStore;

    #[test]
    fn one_client_per_identity() {
        let store = Arc::new(ConfigurationStore::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
        ));
        let registry = ProviderRegistry::builder(store).build();

        for id in ProviderId::ALL {
            assert_eq!(registry.get(id).id(), id);
            assert!(Arc::ptr_eq(&registry.get(id), &registry.get(id)));
        }
        assert_eq!(
            registry.embedding_capable(),
            vec![ProviderId::AzureOpenAi, ProviderId::Gemini, ProviderId::OpenAi]
        );
    }
}
