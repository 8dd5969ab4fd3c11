//! Provider configuration, priority and settings.
//!
//! None of these types can hold a secret; credentials live only in a
//! [`CredentialStore`](crate::credentials::CredentialStore).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ProviderId;
use crate::error::LlmError;

/// Non-secret, per-provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProviderConfig {
    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_endpoint: Option<String>,
    pub custom_headers: BTreeMap<String, String>,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f64,
    #[validate(range(min = 1))]
    pub max_tokens: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: f64,
    #[validate(range(min = -2.0, max = 2.0))]
    pub frequency_penalty: f64,
    #[validate(range(min = -2.0, max = 2.0))]
    pub presence_penalty: f64,
    pub stop_sequences: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            organization_id: None,
            custom_endpoint: None,
            custom_headers: BTreeMap::new(),
            temperature: 0.7,
            max_tokens: 4096,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop_sequences: Vec::new(),
        }
    }
}

impl ProviderConfig {
    /// Defaults with the provider's default model.
    pub fn for_provider(provider: ProviderId) -> Self {
        Self {
            model: provider.default_model().to_string(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.custom_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub const fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = stop;
        self
    }

    /// Validate ranges and the endpoint shape.
    pub fn validate_params(&self) -> Result<(), LlmError> {
        self.validate()
            .map_err(|e| LlmError::InvalidParameter(e.to_string()))?;
        if let Some(endpoint) = &self.custom_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(LlmError::InvalidParameter(format!(
                    "custom_endpoint must be an http(s) URL, got '{endpoint}'"
                )));
            }
        }
        Ok(())
    }
}

/// How the fallback walk orders candidates.
///
/// Only `Sequential` has a defined selection policy. The other two are stored and
/// round-tripped, and currently walk in priority order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackBehavior {
    #[default]
    Sequential,
    LoadBalanced,
    CostOptimized,
}

/// Ordered, duplicate-free list of providers to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PriorityRecord")]
pub struct ProviderPriority {
    providers: Vec<ProviderId>,
    behavior: FallbackBehavior,
}

#[derive(Deserialize)]
struct PriorityRecord {
    providers: Vec<ProviderId>,
    #[serde(default)]
    behavior: FallbackBehavior,
}

impl From<PriorityRecord> for ProviderPriority {
    fn from(record: PriorityRecord) -> Self {
        Self::new(record.providers, record.behavior)
    }
}

impl Default for ProviderPriority {
    fn default() -> Self {
        Self::new(
            vec![ProviderId::Claude, ProviderId::OpenAi, ProviderId::Gemini],
            FallbackBehavior::Sequential,
        )
    }
}

impl ProviderPriority {
    /// Build a priority list; repeated entries keep their first position.
    pub fn new(providers: Vec<ProviderId>, behavior: FallbackBehavior) -> Self {
        let mut deduped = Vec::with_capacity(providers.len());
        for p in providers {
            if !deduped.contains(&p) {
                deduped.push(p);
            }
        }
        Self {
            providers: deduped,
            behavior,
        }
    }

    pub fn sequential(providers: Vec<ProviderId>) -> Self {
        Self::new(providers, FallbackBehavior::Sequential)
    }

    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    pub const fn behavior(&self) -> FallbackBehavior {
        self.behavior
    }

    pub fn contains(&self, provider: ProviderId) -> bool {
        self.providers.contains(&provider)
    }
}

/// Resolved connection settings a client uses for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
    pub organization_id: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_version: None,
            organization_id: None,
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(60),
            max_retries: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_dedups_keeping_first() {
        let priority = ProviderPriority::sequential(vec![
            ProviderId::OpenAi,
            ProviderId::Claude,
            ProviderId::OpenAi,
        ]);
        assert_eq!(
            priority.providers(),
            &[ProviderId::OpenAi, ProviderId::Claude]
        );

        let parsed: ProviderPriority =
            serde_json::from_str(r#"{"providers":["gemini","gemini","local"]}"#).unwrap();
        assert_eq!(parsed.providers(), &[ProviderId::Gemini, ProviderId::Local]);
        assert_eq!(parsed.behavior(), FallbackBehavior::Sequential);
    }

    #[test]
    fn default_priority() {
        let priority = ProviderPriority::default();
        assert_eq!(
            priority.providers(),
            &[ProviderId::Claude, ProviderId::OpenAi, ProviderId::Gemini]
        );
    }

    #[test]
    fn config_validation() {
        assert!(
            ProviderConfig::for_provider(ProviderId::OpenAi)
                .validate_params()
                .is_ok()
        );
        assert!(
            ProviderConfig::for_provider(ProviderId::OpenAi)
                .with_temperature(3.0)
                .validate_params()
                .is_err()
        );
        assert!(
            ProviderConfig::for_provider(ProviderId::Custom)
                .with_endpoint("ftp://example.com")
                .validate_params()
                .is_err()
        );
        assert!(ProviderConfig::default().validate_params().is_err());
    }

    #[test]
    fn fallback_behavior_serializes_kebab_case() {
        let json = serde_json::to_string(&FallbackBehavior::CostOptimized).unwrap();
        assert_eq!(json, "\"cost-optimized\"");
    }
}
