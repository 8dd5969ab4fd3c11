//! Error Types
//!
//! [`LlmError`] is the only error type surfaced by the public API.

use std::time::Duration;

use thiserror::Error;

use crate::types::ProviderId;

/// The unified error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// The provider is missing configuration it needs (endpoint, deployment, ...).
    #[error("{} is not configured: {reason}", .provider.display_name())]
    NotConfigured { provider: ProviderId, reason: String },

    /// The provider rejected the credential.
    #[error("{} rejected the credentials: {message}", .provider.display_name())]
    InvalidCredentials {
        provider: ProviderId,
        message: String,
    },

    /// The supplied API key is malformed (empty, whitespace, ...).
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    /// No secret is stored for the provider.
    #[error("No API key stored for {}", .provider.display_name())]
    NoApiKey { provider: ProviderId },

    /// The provider cannot serve requests right now.
    #[error("{} is unavailable: {message}", .provider.display_name())]
    ProviderUnavailable {
        provider: ProviderId,
        message: String,
    },

    /// An identity that does not name a known provider.
    #[error("Unknown provider: {0}")]
    ProviderNotFound(String),

    /// No provider has been selected as active.
    #[error("No active provider is selected")]
    NoActiveProvider,

    #[error("{} rate limit exceeded{}", .provider.display_name(), format_retry_after(.retry_after))]
    RateLimitExceeded {
        provider: ProviderId,
        retry_after: Option<Duration>,
    },

    #[error("{} context length exceeded: {message}", .provider.display_name())]
    ContextLengthExceeded {
        provider: ProviderId,
        message: String,
    },

    #[error("Model '{model}' is not supported by {}", .provider.display_name())]
    ModelNotSupported { provider: ProviderId, model: String },

    #[error("Network error from {}: {message}", .provider.display_name())]
    NetworkError {
        provider: ProviderId,
        message: String,
    },

    /// The provider answered with something that could not be interpreted.
    #[error("Invalid response from {}: {message}", .provider.display_name())]
    InvalidResponse {
        provider: ProviderId,
        message: String,
    },

    #[error("{} does not support streaming", .provider.display_name())]
    StreamingNotSupported { provider: ProviderId },

    #[error("{} does not support function calling", .provider.display_name())]
    FunctionCallingNotSupported { provider: ProviderId },

    /// `provider` is `None` when no configured provider offers embeddings at all.
    #[error("{}", describe_embeddings_unsupported(.provider))]
    EmbeddingsNotSupported { provider: Option<ProviderId> },

    #[error("Request to {} timed out: {message}", .provider.display_name())]
    Timeout {
        provider: ProviderId,
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// A request or configuration failed validation before any provider was called.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The credential store itself failed (not a missing secret).
    #[error("Credential store error: {0}")]
    CredentialStoreError(String),

    /// Durable configuration storage failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("JSON error: {0}")]
    JsonError(String),
}

/// Fieldless discriminant of [`LlmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConfigured,
    InvalidCredentials,
    InvalidApiKey,
    NoApiKey,
    ProviderUnavailable,
    ProviderNotFound,
    NoActiveProvider,
    RateLimitExceeded,
    ContextLengthExceeded,
    ModelNotSupported,
    NetworkError,
    InvalidResponse,
    StreamingNotSupported,
    FunctionCallingNotSupported,
    EmbeddingsNotSupported,
    Timeout,
    Cancelled,
    InvalidParameter,
    CredentialStoreError,
    StorageError,
    JsonError,
}

impl LlmError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured { .. } => ErrorKind::NotConfigured,
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::InvalidApiKey(_) => ErrorKind::InvalidApiKey,
            Self::NoApiKey { .. } => ErrorKind::NoApiKey,
            Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            Self::NoActiveProvider => ErrorKind::NoActiveProvider,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::ContextLengthExceeded { .. } => ErrorKind::ContextLengthExceeded,
            Self::ModelNotSupported { .. } => ErrorKind::ModelNotSupported,
            Self::NetworkError { .. } => ErrorKind::NetworkError,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::StreamingNotSupported { .. } => ErrorKind::StreamingNotSupported,
            Self::FunctionCallingNotSupported { .. } => ErrorKind::FunctionCallingNotSupported,
            Self::EmbeddingsNotSupported { .. } => ErrorKind::EmbeddingsNotSupported,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::CredentialStoreError(_) => ErrorKind::CredentialStoreError,
            Self::StorageError(_) => ErrorKind::StorageError,
            Self::JsonError(_) => ErrorKind::JsonError,
        }
    }

    /// Whether a failure of this kind on one provider should send the request to the next.
    ///
    /// Malformed input is malformed for every provider, and cancellation ends the walk, so
    /// neither falls back.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::InvalidApiKey
                | ErrorKind::InvalidParameter
                | ErrorKind::Cancelled
                | ErrorKind::NoActiveProvider
                | ErrorKind::ProviderNotFound
                | ErrorKind::CredentialStoreError
                | ErrorKind::StorageError
                | ErrorKind::JsonError
        )
    }

    /// The provider that produced this error, if any.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::NotConfigured { provider, .. }
            | Self::InvalidCredentials { provider, .. }
            | Self::NoApiKey { provider }
            | Self::ProviderUnavailable { provider, .. }
            | Self::RateLimitExceeded { provider, .. }
            | Self::ContextLengthExceeded { provider, .. }
            | Self::ModelNotSupported { provider, .. }
            | Self::NetworkError { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::StreamingNotSupported { provider }
            | Self::FunctionCallingNotSupported { provider }
            | Self::Timeout { provider, .. } => Some(*provider),
            Self::EmbeddingsNotSupported { provider } => *provider,
            _ => None,
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

fn describe_embeddings_unsupported(provider: &Option<ProviderId>) -> String {
    match provider {
        Some(p) => format!("{} does not support embeddings", p.display_name()),
        None => "No configured provider supports embeddings".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_do_not_fall_back() {
        assert!(!LlmError::InvalidApiKey("blank".into()).is_fallback_eligible());
        assert!(!LlmError::InvalidParameter("temperature".into()).is_fallback_eligible());
        assert!(!LlmError::Cancelled.is_fallback_eligible());
        assert!(!LlmError::NoActiveProvider.is_fallback_eligible());
    }

    #[test]
    fn transport_errors_fall_back() {
        let provider = ProviderId::Claude;
        let errors = [
            LlmError::NetworkError {
                provider,
                message: "reset".into(),
            },
            LlmError::RateLimitExceeded {
                provider,
                retry_after: None,
            },
            LlmError::InvalidResponse {
                provider,
                message: "truncated".into(),
            },
            LlmError::Timeout {
                provider,
                message: "30s".into(),
            },
        ];
        for err in errors {
            assert!(err.is_fallback_eligible(), "{err} should fall back");
            assert_eq!(err.provider(), Some(provider));
        }
    }

    #[test]
    fn display_uses_provider_names() {
        let err = LlmError::RateLimitExceeded {
            provider: ProviderId::Claude,
            retry_after: Some(Duration::from_secs(20)),
        };
        assert_eq!(
            err.to_string(),
            "Claude (Anthropic) rate limit exceeded (retry after 20s)"
        );

        let err = LlmError::EmbeddingsNotSupported { provider: None };
        assert_eq!(err.to_string(), "No configured provider supports embeddings");
    }
}
