//! Cancellation utilities
//!
//! Provides first-class cancellation handles for streams and long-running operations.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::streaming::ChatStream;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request cancellation. The in-flight provider call is dropped as soon as it is
    /// polled next, and no further fallback candidates are attempted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation was requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Run `fut` unless cancellation wins the race, in which case `fut` is dropped.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(LlmError::Cancelled),
            out = fut => out,
        }
    }
}

/// Wrap `stream` so that cancelling `handle` yields one `Cancelled` error and ends it.
///
/// The inner stream is dropped on cancellation, closing its transport.
pub fn cancellable_stream(stream: ChatStream, handle: CancelHandle) -> ChatStream {
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures::StreamExt;
        loop {
            let next = tokio::select! {
                biased;
                _ = handle.cancelled() => Err(LlmError::Cancelled),
                item = inner.next() => Ok(item),
            };
            match next {
                Ok(Some(item)) => yield item,
                Ok(None) => break,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };
    Box::pin(s)
}

/// Create a standalone cancel handle that can be shared across tasks.
pub fn new_cancel_handle() -> CancelHandle {
    CancelHandle::new(CancellationToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamChunk;
    use futures::StreamExt;

    #[tokio::test]
    async fn run_returns_cancelled_when_already_cancelled() {
        let handle = new_cancel_handle();
        handle.cancel();
        let out: Result<u32, LlmError> = handle.run(async { Ok(1) }).await;
        assert_eq!(out, Err(LlmError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_stream_yields_single_error() {
        let endless: ChatStream =
            Box::pin(futures::stream::repeat_with(|| Ok(StreamChunk::delta("x"))));
        let handle = new_cancel_handle();
        let mut stream = cancellable_stream(endless, handle.clone());

        assert!(stream.next().await.unwrap().is_ok());
        handle.cancel();
        assert_eq!(stream.next().await, Some(Err(LlmError::Cancelled)));
        assert!(stream.next().await.is_none());
    }
}
