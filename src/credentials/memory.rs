use std::collections::{BTreeSet, HashMap};
use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use super::{CredentialError, CredentialStore};
use crate::types::ProviderId;

/// In-process credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: RwLock<HashMap<ProviderId, SecretString>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<ProviderId> = self
            .secrets
            .try_read()
            .map(|s| {
                let mut ids: Vec<_> = s.keys().copied().collect();
                ids.sort();
                ids
            })
            .unwrap_or_default();
        f.debug_struct("MemoryCredentialStore")
            .field("providers", &ids)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn store(
        &self,
        secret: SecretString,
        provider: ProviderId,
    ) -> Result<(), CredentialError> {
        self.secrets.write().await.insert(provider, secret);
        Ok(())
    }

    async fn retrieve(&self, provider: ProviderId) -> Result<SecretString, CredentialError> {
        self.secrets
            .read()
            .await
            .get(&provider)
            .map(|s| SecretString::from(s.expose_secret().to_owned()))
            .ok_or(CredentialError::NotFound(provider))
    }

    async fn delete(&self, provider: ProviderId) -> Result<(), CredentialError> {
        self.secrets.write().await.remove(&provider);
        Ok(())
    }

    async fn exists(&self, provider: ProviderId) -> bool {
        self.secrets.read().await.contains_key(&provider)
    }

    async fn list_configured(&self) -> BTreeSet<ProviderId> {
        self.secrets.read().await.keys().copied().collect()
    }

    async fn delete_all(&self) -> Result<(), CredentialError> {
        self.secrets.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_retrieve_delete() {
        let store = MemoryCredentialStore::new();
        store
            .store("sk-test-123".into(), ProviderId::OpenAi)
            .await
            .unwrap();

        assert!(store.exists(ProviderId::OpenAi).await);
        let secret = store.retrieve(ProviderId::OpenAi).await.unwrap();
        assert_eq!(secret.expose_secret(), "sk-test-123");

        store.delete(ProviderId::OpenAi).await.unwrap();
        assert_eq!(
            store.retrieve(ProviderId::OpenAi).await.unwrap_err(),
            CredentialError::NotFound(ProviderId::OpenAi)
        );
        // Deleting again is fine.
        store.delete(ProviderId::OpenAi).await.unwrap();
    }

    #[tokio::test]
    async fn list_and_delete_all() {
        let store = MemoryCredentialStore::new();
        store.store("a".into(), ProviderId::Gemini).await.unwrap();
        store.store("b".into(), ProviderId::Claude).await.unwrap();

        let listed: Vec<_> = store.list_configured().await.into_iter().collect();
        assert_eq!(listed, vec![ProviderId::Claude, ProviderId::Gemini]);

        store.delete_all().await.unwrap();
        assert!(store.list_configured().await.is_empty());
    }

    #[tokio::test]
    async fn debug_output_has_no_secrets() {
        let store = MemoryCredentialStore::new();
        store
            .store("super-secret-value".into(), ProviderId::Claude)
            .await
            .unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("Claude"));
        assert!(!debug.contains("super-secret-value"));
    }
}
