//! Credential storage.
//!
//! Secrets are kept out of every other part of the system. The secure-storage primitive
//! itself (OS keychain, vault, ...) is an external collaborator that implements
//! [`CredentialStore`]; [`MemoryCredentialStore`] covers tests and ephemeral use.

use std::collections::BTreeSet;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::error::LlmError;
use crate::types::ProviderId;

mod memory;

pub use memory::MemoryCredentialStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no credential stored for {0}")]
    NotFound(ProviderId),
    /// The underlying secure storage failed.
    #[error("credential backend failure: {0}")]
    Backend(String),
}

impl From<CredentialError> for LlmError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound(provider) => LlmError::NoApiKey { provider },
            CredentialError::Backend(msg) => LlmError::CredentialStoreError(msg),
        }
    }
}

/// Provider-keyed secret storage.
///
/// No operation hands out more than one provider's secret at a time.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store (or replace) the secret for `provider`.
    async fn store(&self, secret: SecretString, provider: ProviderId)
    -> Result<(), CredentialError>;

    /// Fetch the secret for `provider`, or [`CredentialError::NotFound`].
    async fn retrieve(&self, provider: ProviderId) -> Result<SecretString, CredentialError>;

    /// Remove the secret for `provider`. Removing an absent secret is not an error.
    async fn delete(&self, provider: ProviderId) -> Result<(), CredentialError>;

    async fn exists(&self, provider: ProviderId) -> bool;

    /// Identities that currently have a secret.
    async fn list_configured(&self) -> BTreeSet<ProviderId>;

    async fn delete_all(&self) -> Result<(), CredentialError>;
}
