//! Persisted layout of the configuration state.
//!
//! Three independent records; a record that is missing or unreadable falls back to its
//! default instead of failing the load.

use std::collections::BTreeMap;

use tracing::warn;

use super::ConfigState;
use crate::error::LlmError;
use crate::storage::KeyValueStore;
use crate::types::{ProviderConfig, ProviderId, ProviderPriority};

pub const CONFIGS_KEY: &str = "llm.providerConfigs";
pub const ACTIVE_KEY: &str = "llm.activeProvider";
pub const PRIORITY_KEY: &str = "llm.providerPriority";

pub(crate) async fn read_state(storage: &dyn KeyValueStore) -> ConfigState {
    let configs = read_configs(storage).await;
    let priority = read_priority(storage).await;
    let mut active = read_active(storage).await;

    if let Some(id) = active {
        if !configs.contains_key(&id) {
            warn!(provider = %id, "Persisted active provider has no configuration; ignoring");
            active = None;
        }
    }

    ConfigState {
        active,
        configs,
        priority,
    }
}

async fn read_record(storage: &dyn KeyValueStore, key: &str) -> Option<String> {
    match storage.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Failed to read configuration record");
            None
        }
    }
}

async fn read_configs(storage: &dyn KeyValueStore) -> BTreeMap<ProviderId, ProviderConfig> {
    let Some(raw) = read_record(storage, CONFIGS_KEY).await else {
        return BTreeMap::new();
    };
    let entries: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(key = CONFIGS_KEY, error = %e, "Corrupt configuration record; ignoring");
            return BTreeMap::new();
        }
    };

    // Entries are decoded one by one so a single bad provider doesn't drop the rest.
    let mut configs = BTreeMap::new();
    for (name, value) in entries {
        let Ok(id) = name.parse::<ProviderId>() else {
            warn!(provider = %name, "Unknown provider in configuration record; skipping");
            continue;
        };
        match serde_json::from_value::<ProviderConfig>(value) {
            Ok(config) => {
                configs.insert(id, config);
            }
            Err(e) => warn!(provider = %id, error = %e, "Corrupt provider configuration; skipping"),
        }
    }
    configs
}

async fn read_active(storage: &dyn KeyValueStore) -> Option<ProviderId> {
    let raw = read_record(storage, ACTIVE_KEY).await?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(key = ACTIVE_KEY, value = %raw, "Unknown active provider; ignoring");
            None
        }
    }
}

async fn read_priority(storage: &dyn KeyValueStore) -> ProviderPriority {
    let Some(raw) = read_record(storage, PRIORITY_KEY).await else {
        return ProviderPriority::default();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(key = PRIORITY_KEY, error = %e, "Corrupt priority record; using default");
        ProviderPriority::default()
    })
}

pub(crate) async fn write_configs(
    storage: &dyn KeyValueStore,
    configs: &BTreeMap<ProviderId, ProviderConfig>,
) -> Result<(), LlmError> {
    storage
        .set(CONFIGS_KEY, serde_json::to_string(configs)?)
        .await
}

pub(crate) async fn write_active(
    storage: &dyn KeyValueStore,
    active: Option<ProviderId>,
) -> Result<(), LlmError> {
    match active {
        Some(id) => storage.set(ACTIVE_KEY, id.as_str().to_string()).await,
        None => storage.remove(ACTIVE_KEY).await,
    }
}

pub(crate) async fn write_priority(
    storage: &dyn KeyValueStore,
    priority: &ProviderPriority,
) -> Result<(), LlmError> {
    storage
        .set(PRIORITY_KEY, serde_json::to_string(priority)?)
        .await
}

pub(crate) async fn clear(storage: &dyn KeyValueStore) -> Result<(), LlmError> {
    storage.remove(CONFIGS_KEY).await?;
    storage.remove(ACTIVE_KEY).await?;
    storage.remove(PRIORITY_KEY).await
}
