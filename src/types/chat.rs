//! Chat request / response types.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::LlmError;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Function,
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the parameters.
    pub parameters: serde_json::Value,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    Json,
    JsonSchema { schema: serde_json::Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_call: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_function_call(mut self, call: FunctionCall) -> Self {
        self.function_call = Some(call);
        self
    }
}

/// A chat completion request.
///
/// An empty `model` means "use the provider's configured model".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "at least one message is required"))]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: String,
    #[validate(range(min = 0.0, max = 2.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[validate(range(min = 1))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<FunctionDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: String::new(),
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            functions: None,
            response_format: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_functions(mut self, functions: Vec<FunctionDefinition>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn validate_params(&self) -> Result<(), LlmError> {
        self.validate()
            .map_err(|e| LlmError::InvalidParameter(e.to_string()))
    }

    /// Whether the request asks for function calling.
    pub fn uses_functions(&self) -> bool {
        self.functions.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// All message text, including the system prompt, joined for token estimation.
    pub fn prompt_text(&self) -> String {
        let mut text = self.system_prompt.clone().unwrap_or_default();
        for message in &self.messages {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&message.content);
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    FunctionCall,
}

/// Token accounting. The total is always derived from its parts and is wide enough that
/// `total == prompt + completion` holds for every pair of counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UsageParts")]
pub struct TokenUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u64,
}

#[derive(Deserialize)]
struct UsageParts {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl From<UsageParts> for TokenUsage {
    fn from(parts: UsageParts) -> Self {
        Self::new(parts.prompt_tokens, parts.completion_tokens)
    }
}

impl TokenUsage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens as u64 + completion_tokens as u64,
        }
    }

    pub const fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    pub const fn completion_tokens(&self) -> u32 {
        self.completion_tokens
    }

    pub const fn total_tokens(&self) -> u64 {
        self.total_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub message: ChatMessage,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    pub fn content_text(&self) -> &str {
        &self.message.content
    }
}

/// One increment of a streamed completion.
///
/// A chunk carrying a `finish_reason` is the last one a healthy stream yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    pub fn delta(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            role: None,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self {
            delta: String::new(),
            role: None,
            finish_reason: Some(reason),
            usage: None,
        }
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub const fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}
