//! Streaming types.
//!
//! Every provider streams by returning a [`ChatStream`]; the orchestrator hands callers a
//! [`ChatStreamHandle`] so the stream can be stopped from another task.

use std::pin::Pin;

use futures::Stream;

use crate::error::LlmError;
use crate::types::StreamChunk;
use crate::utils::cancel::CancelHandle;

/// Chat Stream - pinned, boxed stream of [`StreamChunk`]s.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

/// Chat stream with first-class cancellation handle
///
/// # Example
/// ```rust,no_run
/// # use llm_relay::prelude::*;
/// # async fn example(relay: Orchestrator) -> Result<(), LlmError> {
/// let handle = relay
///     .stream_chat_completion(ChatRequest::new(vec![ChatMessage::user("Hello")]))
///     .await?;
///
/// // Cancel if needed; the stream yields `LlmError::Cancelled` and ends.
/// handle.cancel.cancel();
/// # Ok(())
/// # }
/// ```
pub struct ChatStreamHandle {
    /// The underlying chat stream
    pub stream: ChatStream,
    /// Handle to cancel the stream
    pub cancel: CancelHandle,
}

impl std::fmt::Debug for ChatStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
