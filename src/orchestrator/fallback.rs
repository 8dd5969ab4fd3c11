//! The fallback walk for request/response operations.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::error::LlmError;
use crate::provider::{Provider, ProviderClient};
use crate::types::{FallbackBehavior, ProviderId};
use crate::utils::cancel::CancelHandle;

/// Why a candidate was passed over without being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No usable credential right now.
    NotReady,
    /// Still cooling down after repeated failures.
    Unhealthy,
    /// Lacks the capability the operation needs.
    MissingCapability,
}

/// One failed attempt within a walk.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackAttempt {
    pub provider: ProviderId,
    pub error: LlmError,
    pub elapsed: Duration,
}

/// How a request was served.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackReport {
    /// Provider whose result was returned.
    pub provider: ProviderId,
    /// Active provider at the time of the call.
    pub primary: ProviderId,
    /// Failed attempts, in order.
    pub failed: Vec<FallbackAttempt>,
    pub skipped: Vec<(ProviderId, SkipReason)>,
    pub total_duration: Duration,
}

impl FallbackReport {
    /// Number of providers actually called, including the successful one.
    pub fn attempt_count(&self) -> usize {
        self.failed.len() + 1
    }

    pub fn used_fallback(&self) -> bool {
        self.provider != self.primary
    }

    pub fn failed_providers(&self) -> Vec<ProviderId> {
        self.failed.iter().map(|a| a.provider).collect()
    }
}

/// Which operation a walk serves; embeddings filter candidates by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Chat,
    Stream,
    Embeddings,
}

impl Operation {
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Stream => "stream",
            Self::Embeddings => "embeddings",
        }
    }
}

pub(crate) struct WalkState {
    pub(crate) primary: ProviderId,
    pub(crate) failed: Vec<FallbackAttempt>,
    pub(crate) skipped: Vec<(ProviderId, SkipReason)>,
    /// The error reported if every attempt fails.
    pub(crate) first_error: Option<LlmError>,
    started: Instant,
}

impl WalkState {
    pub(crate) fn new(primary: ProviderId) -> Self {
        Self {
            primary,
            failed: Vec::new(),
            skipped: Vec::new(),
            first_error: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn fail(&mut self, provider: ProviderId, error: LlmError, elapsed: Duration) {
        if self.first_error.is_none() {
            self.first_error = Some(error.clone());
        }
        self.failed.push(FallbackAttempt {
            provider,
            error,
            elapsed,
        });
    }

    pub(crate) fn skip(&mut self, provider: ProviderId, reason: SkipReason) {
        debug!(provider = %provider, ?reason, "Skipping fallback candidate");
        self.skipped.push((provider, reason));
    }

    pub(crate) fn finish(self, provider: ProviderId) -> FallbackReport {
        FallbackReport {
            provider,
            primary: self.primary,
            failed: self.failed,
            skipped: self.skipped,
            total_duration: self.started.elapsed(),
        }
    }

    pub(crate) fn into_error(self, op: Operation) -> LlmError {
        self.first_error.unwrap_or(match op {
            Operation::Embeddings => LlmError::EmbeddingsNotSupported { provider: None },
            _ => LlmError::ProviderUnavailable {
                provider: self.primary,
                message: "no provider could serve the request".to_string(),
            },
        })
    }
}

impl Orchestrator {
    /// Decide whether `id` is attempted as a fallback candidate right now.
    pub(crate) async fn admit_candidate(
        &self,
        client: &Provider,
        op: Operation,
        state: &mut WalkState,
    ) -> bool {
        let id = client.id();
        let caps = client.capabilities();
        let capable = match op {
            Operation::Chat => true,
            Operation::Stream => caps.supports_streaming,
            Operation::Embeddings => caps.supports_embeddings,
        };
        if !capable {
            state.skip(id, SkipReason::MissingCapability);
            return false;
        }
        if !client.is_configured().await {
            state.skip(id, SkipReason::NotReady);
            return false;
        }
        if !self.health.is_available(id) {
            state.skip(id, SkipReason::Unhealthy);
            return false;
        }
        true
    }

    /// Optional pause before fallback attempt `n` (0-based). Cancellation cuts it short.
    pub(crate) async fn pause_before_fallback(
        &self,
        n: u32,
        cancel: &CancelHandle,
    ) -> Result<(), LlmError> {
        if let Some(policy) = &self.options.backoff {
            let delay = policy.calculate_delay(n);
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before next fallback attempt");
            cancel
                .run(async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }

    pub(crate) fn record(&self, id: ProviderId, elapsed: Duration, result: Result<(), &LlmError>) {
        match result {
            Ok(()) => self.health.record_success(id, elapsed),
            Err(LlmError::Cancelled) => {}
            Err(e) => self.health.record_failure(id, elapsed, e),
        }
    }

    pub(crate) fn note_behavior(&self, behavior: FallbackBehavior) {
        if behavior != FallbackBehavior::Sequential {
            debug!(?behavior, "Fallback mode has no selection policy; walking in priority order");
        }
    }

    /// Run `attempt` against the primary, then against each admitted candidate in priority
    /// order, until one succeeds.
    ///
    /// The configuration is read once, up front; no lock is held while a provider runs.
    pub(crate) async fn run_walk<T, F, Fut>(
        &self,
        op: Operation,
        cancel: &CancelHandle,
        mut attempt: F,
    ) -> Result<(T, FallbackReport), LlmError>
    where
        F: FnMut(Arc<Provider>) -> Fut + Send,
        Fut: Future<Output = Result<T, LlmError>> + Send,
        T: Send,
    {
        let snapshot = self.store.snapshot().await;
        let primary = snapshot.active.ok_or(LlmError::NoActiveProvider)?;
        self.note_behavior(snapshot.priority.behavior());
        let mut state = WalkState::new(primary);

        let primary_client = self.registry.get(primary);
        if op == Operation::Embeddings && !primary_client.capabilities().supports_embeddings {
            state.skip(primary, SkipReason::MissingCapability);
        } else {
            let started = Instant::now();
            let result = cancel.run(attempt(primary_client)).await;
            let elapsed = started.elapsed();
            self.record(primary, elapsed, result.as_ref().map(|_| ()));
            match result {
                Ok(value) => return Ok((value, state.finish(primary))),
                Err(e) if !e.is_fallback_eligible() => return Err(e),
                Err(e) => {
                    warn!(provider = %primary, op = op.as_str(), error = %e, "Primary provider failed");
                    self.notify(primary, &e);
                    state.fail(primary, e, elapsed);
                }
            }
        }

        let mut fallback_index = 0u32;
        for candidate in snapshot.candidates(Some(primary)) {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            let client = self.registry.get(candidate);
            if !self.admit_candidate(&client, op, &mut state).await {
                continue;
            }
            if state.first_error.is_some() {
                self.pause_before_fallback(fallback_index, cancel).await?;
                fallback_index += 1;
            }

            debug!(provider = %candidate, op = op.as_str(), "Attempting fallback provider");
            let started = Instant::now();
            let result = cancel.run(attempt(client)).await;
            let elapsed = started.elapsed();
            self.record(candidate, elapsed, result.as_ref().map(|_| ()));
            match result {
                Ok(value) => {
                    info!(
                        provider = %candidate,
                        primary = %primary,
                        op = op.as_str(),
                        failed = state.failed.len(),
                        "Request served by fallback provider"
                    );
                    return Ok((value, state.finish(candidate)));
                }
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(e) => {
                    warn!(provider = %candidate, op = op.as_str(), error = %e, "Fallback provider failed");
                    self.notify(candidate, &e);
                    state.fail(candidate, e, elapsed);
                }
            }
        }

        Err(state.into_error(op))
    }

    pub(crate) fn notify(&self, provider: ProviderId, error: &LlmError) {
        if let Some(cb) = &self.options.on_provider_failure {
            cb(provider, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_is_kept() {
        let mut state = WalkState::new(ProviderId::Claude);
        state.fail(
            ProviderId::Claude,
            LlmError::NetworkError {
                provider: ProviderId::Claude,
                message: "reset".into(),
            },
            Duration::ZERO,
        );
        state.fail(
            ProviderId::OpenAi,
            LlmError::Timeout {
                provider: ProviderId::OpenAi,
                message: "30s".into(),
            },
            Duration::ZERO,
        );
        assert!(matches!(
            state.into_error(Operation::Chat),
            LlmError::NetworkError { provider: ProviderId::Claude, .. }
        ));
    }

    #[test]
    fn nothing_attempted_for_embeddings() {
        let state = WalkState::new(ProviderId::Claude);
        assert_eq!(
            state.into_error(Operation::Embeddings),
            LlmError::EmbeddingsNotSupported { provider: None }
        );
    }
}
