//! Provider identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// The closed set of backends.
///
/// Variants are declared in the order of their identity strings, so the derived `Ord`
/// sorts the same way as the serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "azure-openai")]
    AzureOpenAi,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        Self::AzureOpenAi,
        Self::Claude,
        Self::Custom,
        Self::Gemini,
        Self::Local,
        Self::OpenAi,
    ];

    /// Stable identity string used as the join key across stores.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AzureOpenAi => "azure-openai",
            Self::Claude => "claude",
            Self::Custom => "custom",
            Self::Gemini => "gemini",
            Self::Local => "local",
            Self::OpenAi => "openai",
        }
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::AzureOpenAi => "Azure OpenAI",
            Self::Claude => "Claude (Anthropic)",
            Self::Custom => "Custom Provider",
            Self::Gemini => "Google Gemini",
            Self::Local => "Local Model",
            Self::OpenAi => "OpenAI",
        }
    }

    /// Model used when neither the request nor the stored configuration names one.
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::AzureOpenAi => "gpt-4o",
            Self::Claude => "claude-3-5-sonnet-20241022",
            Self::Custom => "custom-model",
            Self::Gemini => "gemini-1.5-pro",
            Self::Local => "llama-3-8b",
            Self::OpenAi => "gpt-4o",
        }
    }

    /// Position in [`ProviderId::ALL`].
    pub(crate) const fn index(&self) -> usize {
        match self {
            Self::AzureOpenAi => 0,
            Self::Claude => 1,
            Self::Custom => 2,
            Self::Gemini => 3,
            Self::Local => 4,
            Self::OpenAi => 5,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LlmError::ProviderNotFound(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_identity_strings() {
        let mut by_enum = ProviderId::ALL.to_vec();
        by_enum.sort();
        let mut by_str = ProviderId::ALL.to_vec();
        by_str.sort_by_key(|p| p.as_str());
        assert_eq!(by_enum, by_str);
    }

    #[test]
    fn index_matches_all() {
        for (i, p) in ProviderId::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn parse_and_serialize() {
        assert_eq!("openai".parse::<ProviderId>().unwrap(), ProviderId::OpenAi);
        assert_eq!(
            " Azure-OpenAI ".parse::<ProviderId>().unwrap(),
            ProviderId::AzureOpenAi
        );
        assert!(matches!(
            "mistral".parse::<ProviderId>(),
            Err(LlmError::ProviderNotFound(name)) if name == "mistral"
        ));

        let json = serde_json::to_string(&ProviderId::AzureOpenAi).unwrap();
        assert_eq!(json, "\"azure-openai\"");
        let back: ProviderId = serde_json::from_str("\"claude\"").unwrap();
        assert_eq!(back, ProviderId::Claude);
    }
}
