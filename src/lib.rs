//! # llm-relay - Provider orchestration for LLM backends
//!
//! llm-relay puts one uniform chat / streaming / embedding surface in front of several
//! interchangeable LLM backends (Claude, OpenAI, Azure OpenAI, Gemini, a local model and a
//! custom OpenAI-compatible endpoint). It keeps per-provider configuration, keeps secrets in a
//! separate credential store, and walks a priority-ordered fallback list when the active
//! provider fails.
//!
//! ## Features
//!
//! - **Closed provider set**: every backend is a variant of [`provider::Provider`], dispatched
//!   with a `match` instead of a stringly-typed lookup.
//! - **Credential isolation**: secrets only ever live in a [`credentials::CredentialStore`];
//!   persisted configuration never contains them.
//! - **Deterministic fallback**: the [`orchestrator::Orchestrator`] walks the priority list in
//!   order, one provider at a time, and reports the primary's error when everything fails.
//! - **Cancellation**: every operation has a `_with_cancel` variant, and streams come with a
//!   [`streaming::ChatStreamHandle`].
//! - **Pluggable transport**: the wire protocol sits behind [`provider::Backend`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_relay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LlmError> {
//!     let credentials = Arc::new(MemoryCredentialStore::new());
//!     let storage = Arc::new(MemoryKeyValueStore::new());
//!     let store = Arc::new(ConfigurationStore::load(credentials, storage).await);
//!
//!     store
//!         .configure_provider(ProviderId::OpenAi, "sk-your-key".into(), None)
//!         .await?;
//!
//!     // Each provider talks to the outside world through a `Backend`.
//!     let registry = ProviderRegistry::builder(store.clone()).build();
//!     let relay = Orchestrator::new(store, Arc::new(registry));
//!
//!     let request = ChatRequest::new(vec![ChatMessage::user("Hello, world!")]);
//!     let response = relay.chat_completion(request).await?;
//!     println!("{}", response.message.content);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod backoff;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod storage;
pub mod streaming;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use error::LlmError;

/// Commonly used types, re-exported for `use llm_relay::prelude::*`.
pub mod prelude {
    pub use crate::backoff::BackoffPolicy;
    pub use crate::config::ConfigurationStore;
    pub use crate::credentials::{CredentialError, CredentialStore, MemoryCredentialStore};
    pub use crate::error::{ErrorKind, LlmError};
    pub use crate::orchestrator::{
        FallbackAttempt, FallbackReport, HealthPolicy, Orchestrator, OrchestratorOptions,
        ProviderHealth, SkipReason,
    };
    pub use crate::provider::{
        Backend, BackendCall, Provider, ProviderClient, ProviderRegistry, TransportError,
        TransportErrorKind,
    };
    pub use crate::storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
    pub use crate::streaming::{ChatStream, ChatStreamHandle};
    pub use crate::types::*;
    pub use crate::utils::cancel::{CancelHandle, new_cancel_handle};
}
