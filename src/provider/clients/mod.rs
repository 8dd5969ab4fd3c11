//! Concrete provider clients, one per [`ProviderId`](crate::types::ProviderId).

mod azure;
mod claude;
mod custom;
mod gemini;
mod local;
mod openai;

pub use azure::AzureOpenAiClient;
pub use claude::ClaudeClient;
pub use custom::CustomClient;
pub use gemini::GeminiClient;
pub use local::LocalModelClient;
pub use openai::OpenAiClient;

use crate::types::{ChatMessage, ChatRequest, MessageRole};

/// Move `system_prompt` to the front of the message list, for APIs without a separate
/// system field.
pub(crate) fn inline_system_prompt(mut request: ChatRequest) -> ChatRequest {
    if let Some(prompt) = request.system_prompt.take() {
        if !prompt.trim().is_empty() {
            request.messages.insert(0, ChatMessage::system(prompt));
        }
    }
    request
}

/// Fold system-role messages into `system_prompt`, for APIs that only accept it there.
pub(crate) fn hoist_system_messages(mut request: ChatRequest) -> ChatRequest {
    let (system, rest): (Vec<ChatMessage>, Vec<ChatMessage>) = request
        .messages
        .into_iter()
        .partition(|m| m.role == MessageRole::System);
    request.messages = rest;

    let mut parts: Vec<String> = request.system_prompt.take().into_iter().collect();
    parts.extend(system.into_iter().map(|m| m.content));
    parts.retain(|p| !p.trim().is_empty());
    if !parts.is_empty() {
        request.system_prompt = Some(parts.join("\n\n"));
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_puts_prompt_first() {
        let request =
            ChatRequest::new(vec![ChatMessage::user("hi")]).with_system_prompt("be brief");
        let request = inline_system_prompt(request);
        assert_eq!(request.system_prompt, None);
        assert_eq!(request.messages[0], ChatMessage::system("be brief"));
        assert_eq!(request.messages.len(), 2);
    }

    #[test]
    fn hoist_merges_system_messages() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("rule one"),
            ChatMessage::user("hi"),
            ChatMessage::system("rule two"),
        ])
        .with_system_prompt("base");
        let request = hoist_system_messages(request);
        assert_eq!(
            request.system_prompt.as_deref(),
            Some("base\n\nrule one\n\nrule two")
        );
        assert_eq!(request.messages, vec![ChatMessage::user("hi")]);
    }
}
