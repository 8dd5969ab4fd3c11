//! Static capability descriptors.

use serde::{Deserialize, Serialize};

/// Price per thousand tokens, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub context_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, context_length: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            context_length,
            pricing: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub const fn with_pricing(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.pricing = Some(ModelPricing::new(input_per_1k, output_per_1k));
        self
    }
}

/// What a provider client can do. Fixed for the lifetime of the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supports_streaming: bool,
    pub supports_embeddings: bool,
    pub supports_vision: bool,
    pub supports_function_calling: bool,
    pub max_tokens: u32,
    pub max_context_length: u32,
    pub supported_models: Vec<ModelInfo>,
}

impl ProviderCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }

    pub const fn with_embeddings(mut self) -> Self {
        self.supports_embeddings = true;
        self
    }

    pub const fn with_vision(mut self) -> Self {
        self.supports_vision = true;
        self
    }

    pub const fn with_function_calling(mut self) -> Self {
        self.supports_function_calling = true;
        self
    }

    pub const fn with_limits(mut self, max_tokens: u32, max_context_length: u32) -> Self {
        self.max_tokens = max_tokens;
        self.max_context_length = max_context_length;
        self
    }

    pub fn with_model(mut self, model: ModelInfo) -> Self {
        self.supported_models.push(model);
        self
    }

    pub fn model(&self, id: &str) -> Option<&ModelInfo> {
        self.supported_models.iter().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_flags() {
        let caps = ProviderCapabilities::new()
            .with_streaming()
            .with_function_calling()
            .with_limits(4096, 128_000)
            .with_model(ModelInfo::new("m-1", "Model One", 8192));

        assert!(caps.supports_streaming);
        assert!(!caps.supports_embeddings);
        assert!(caps.supports_function_calling);
        assert_eq!(caps.max_context_length, 128_000);
        assert_eq!(caps.model("m-1").map(|m| m.context_length), Some(8192));
        assert!(caps.model("m-2").is_none());
    }
}
