//! Durable key-value storage for configuration records.
//!
//! Values are opaque strings (JSON documents in practice). Implementations must not be used
//! for secrets.

use async_trait::async_trait;

use crate::error::LlmError;

mod file;
mod memory;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, LlmError>;

    async fn set(&self, key: &str, value: String) -> Result<(), LlmError>;

    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), LlmError>;
}
