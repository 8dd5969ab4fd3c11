//! Transport seam.
//!
//! A [`Backend`] speaks one provider's wire protocol. Clients resolve credentials,
//! configuration and capability checks, then hand a [`BackendCall`] plus the shaped
//! request to the backend and translate any [`TransportError`] into [`LlmError`].

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use secrecy::SecretString;
use thiserror::Error;

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, ProviderId, StreamChunk};
use crate::utils::mask::masked_headers;

/// Stream of raw chunks as delivered by a backend.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, TransportError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The server answered with a non-success HTTP status.
    Status(u16),
    /// Connection could not be established or was lost.
    Connect,
    Timeout,
    /// The body could not be decoded.
    Decode,
    /// The backend or the server aborted the request. Caller cancellation never shows up
    /// here; it is [`LlmError::Cancelled`] from the `CancelHandle`.
    Cancelled,
}

/// A failure below the provider abstraction.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// Provider error code from the response body, e.g. `context_length_exceeded`.
    pub code: Option<String>,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status(status), message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub const fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            TransportErrorKind::Status(s) => Some(s),
            _ => None,
        }
    }

    pub fn code_is(&self, code: &str) -> bool {
        self.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(code))
    }
}

/// Everything a backend needs to address one provider for one call.
pub struct BackendCall {
    pub provider: ProviderId,
    /// Base URL of the API.
    pub endpoint: String,
    /// Model, or deployment name for Azure.
    pub model: String,
    pub secret: SecretString,
    pub headers: BTreeMap<String, String>,
    pub organization_id: Option<String>,
    pub api_version: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCall")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("secret", &"[REDACTED]")
            .field("headers", &masked_headers(&self.headers))
            .field("organization_id", &self.organization_id)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn complete(
        &self,
        call: &BackendCall,
        request: &ChatRequest,
    ) -> Result<ChatResponse, TransportError>;

    async fn stream(
        &self,
        call: &BackendCall,
        request: &ChatRequest,
    ) -> Result<ChunkStream, TransportError>;

    async fn embed(&self, call: &BackendCall, input: &str) -> Result<Vec<f32>, TransportError>;

    /// Cheapest authenticated request the API offers, for credential checks.
    async fn probe(&self, call: &BackendCall) -> Result<(), TransportError>;
}

/// Backend used when none was injected: every call fails to connect.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredBackend;

impl UnconfiguredBackend {
    fn error(call: &BackendCall) -> TransportError {
        TransportError::connect(format!(
            "no transport registered for {}",
            call.provider.as_str()
        ))
    }
}

#[async_trait]
impl Backend for UnconfiguredBackend {
    async fn complete(
        &self,
        call: &BackendCall,
        _request: &ChatRequest,
    ) -> Result<ChatResponse, TransportError> {
        Err(Self::error(call))
    }

    async fn stream(
        &self,
        call: &BackendCall,
        _request: &ChatRequest,
    ) -> Result<ChunkStream, TransportError> {
        Err(Self::error(call))
    }

    async fn embed(&self, call: &BackendCall, _input: &str) -> Result<Vec<f32>, TransportError> {
        Err(Self::error(call))
    }

    async fn probe(&self, call: &BackendCall) -> Result<(), TransportError> {
        Err(Self::error(call))
    }
}

/// Status and kind based mapping shared by every provider.
///
/// Clients check their own error codes first and fall through to this.
pub fn map_transport_error(provider: ProviderId, model: &str, err: TransportError) -> LlmError {
    let TransportError {
        kind,
        code,
        message,
        retry_after,
    } = err;
    match kind {
        TransportErrorKind::Connect => LlmError::NetworkError { provider, message },
        TransportErrorKind::Timeout => LlmError::Timeout { provider, message },
        TransportErrorKind::Decode => LlmError::InvalidResponse { provider, message },
        TransportErrorKind::Cancelled => LlmError::NetworkError {
            provider,
            message: format!("request aborted: {message}"),
        },
        TransportErrorKind::Status(status) => match status {
            401 | 403 => LlmError::InvalidCredentials { provider, message },
            404 => LlmError::ModelNotSupported {
                provider,
                model: model.to_string(),
            },
            408 => LlmError::Timeout { provider, message },
            413 => LlmError::ContextLengthExceeded { provider, message },
            429 => LlmError::RateLimitExceeded {
                provider,
                retry_after,
            },
            500..=599 => LlmError::ProviderUnavailable {
                provider,
                message: format!("HTTP {status}: {message}"),
            },
            _ => LlmError::InvalidResponse {
                provider,
                message: match code {
                    Some(code) => format!("HTTP {status} ({code}): {message}"),
                    None => format!("HTTP {status}: {message}"),
                },
            },
        },
    }
}
