//! Streaming fallback.
//!
//! Chunks are forwarded as they arrive. When a provider's stream fails before a chunk
//! with a finish reason, the next candidate's stream starts from its own beginning; the
//! caller keeps whatever partial output it already received. Nothing is merged.

use std::time::Instant;

use futures_util::StreamExt;
use tracing::{info, warn};

use super::Orchestrator;
use super::fallback::{Operation, WalkState};
use crate::error::LlmError;
use crate::provider::ProviderClient;
use crate::streaming::ChatStreamHandle;
use crate::types::ChatRequest;
use crate::utils::cancel::{CancelHandle, cancellable_stream};

impl Orchestrator {
    /// Stream a completion, falling back in priority order.
    ///
    /// Request validation and the active-provider lookup happen before this returns, so
    /// `InvalidParameter` and `NoActiveProvider` are never delivered through the stream.
    /// Every later failure is the stream's last item. When all providers fail, that item
    /// is the active provider's error. Cancelling `cancel` yields one
    /// [`LlmError::Cancelled`] and ends the stream.
    pub async fn stream_chat_completion_with_cancel(
        &self,
        request: ChatRequest,
        cancel: CancelHandle,
    ) -> Result<ChatStreamHandle, LlmError> {
        request.validate_params()?;
        let snapshot = self.store.snapshot().await;
        let primary = snapshot.active.ok_or(LlmError::NoActiveProvider)?;
        self.note_behavior(snapshot.priority.behavior());
        let candidates = snapshot.candidates(Some(primary));

        let this = self.clone();
        let handle = cancel.clone();
        let stream = async_stream::stream! {
            let mut state = WalkState::new(primary);
            let mut fallback_index = 0u32;

            for id in std::iter::once(primary).chain(candidates) {
                if handle.is_cancelled() {
                    yield Err(LlmError::Cancelled);
                    return;
                }
                let client = this.registry.get(id);
                if id != primary {
                    if !this.admit_candidate(&client, Operation::Stream, &mut state).await {
                        continue;
                    }
                    if state.first_error.is_some() {
                        if let Err(e) = this.pause_before_fallback(fallback_index, &handle).await {
                            yield Err(e);
                            return;
                        }
                        fallback_index += 1;
                    }
                }

                let started = Instant::now();
                let opened = handle.run(client.stream_chat_completion(request.clone())).await;
                let outcome = match opened {
                    Err(e) => Err(e),
                    Ok(inner) => {
                        let mut inner = cancellable_stream(inner, handle.clone());
                        loop {
                            match inner.next().await {
                                Some(Err(e)) => break Err(e),
                                None => {
                                    break Err(LlmError::InvalidResponse {
                                        provider: id,
                                        message: "stream ended before a finish reason".to_string(),
                                    });
                                }
                                Some(Ok(chunk)) => {
                                    let done = chunk.is_final();
                                    yield Ok(chunk);
                                    if done {
                                        break Ok(());
                                    }
                                }
                            }
                        }
                    }
                };
                let elapsed = started.elapsed();

                match outcome {
                    Ok(()) => {
                        this.record(id, elapsed, Ok(()));
                        if id != primary {
                            info!(
                                provider = %id,
                                primary = %primary,
                                op = Operation::Stream.as_str(),
                                failed = state.failed.len(),
                                "Request served by fallback provider"
                            );
                        }
                        return;
                    }
                    Err(LlmError::Cancelled) => {
                        yield Err(LlmError::Cancelled);
                        return;
                    }
                    Err(e) => {
                        this.record(id, elapsed, Err(&e));
                        if id == primary && !e.is_fallback_eligible() {
                            yield Err(e);
                            return;
                        }
                        warn!(provider = %id, op = Operation::Stream.as_str(), error = %e, "Stream failed");
                        this.notify(id, &e);
                        state.fail(id, e, elapsed);
                    }
                }
            }

            yield Err(state.into_error(Operation::Stream));
        };

        Ok(ChatStreamHandle {
            stream: Box::pin(stream),
            cancel,
        })
    }
}
