//! Per-provider health statistics.
//!
//! A provider that failed `failure_threshold` times in a row is skipped as a fallback
//! candidate until `consecutive_failures * cooldown_per_failure` has passed since its last
//! failure. After `reset_after` without failures its streak is forgotten.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::LlmError;
use crate::types::ProviderId;

#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub cooldown_per_failure: Duration,
    pub reset_after: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 3,
            cooldown_per_failure: Duration::from_secs(60),
            reset_after: Duration::from_secs(3600),
        }
    }
}

impl HealthPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub const fn with_cooldown_per_failure(mut self, cooldown: Duration) -> Self {
        self.cooldown_per_failure = cooldown;
        self
    }

    pub const fn with_reset_after(mut self, reset_after: Duration) -> Self {
        self.reset_after = reset_after;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub total_requests: u64,
    pub total_failures: u64,
    pub consecutive_failures: u32,
    pub average_response_time: Duration,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProviderHealth {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        1.0 - self.total_failures as f64 / self.total_requests as f64
    }

    /// Below the failure threshold.
    pub fn is_healthy(&self, policy: &HealthPolicy) -> bool {
        self.consecutive_failures < policy.failure_threshold
    }

    fn track_latency(&mut self, elapsed: Duration) {
        self.total_requests += 1;
        let n = self.total_requests as u128;
        let avg = self.average_response_time.as_micros();
        let next = (avg * (n - 1) + elapsed.as_micros()) / n;
        self.average_response_time = Duration::from_micros(u64::try_from(next).unwrap_or(u64::MAX));
    }

    /// Forget an old failure streak.
    fn expire(&mut self, policy: &HealthPolicy, now: DateTime<Utc>) {
        if let Some(last) = self.last_failure {
            if elapsed_since(last, now) >= policy.reset_after {
                self.consecutive_failures = 0;
            }
        }
    }

    fn is_available_at(&self, policy: &HealthPolicy, now: DateTime<Utc>) -> bool {
        if self.is_healthy(policy) {
            return true;
        }
        let Some(last) = self.last_failure else {
            return true;
        };
        let elapsed = elapsed_since(last, now);
        elapsed >= policy.reset_after || elapsed >= self.cooldown(policy)
    }

    /// `consecutive_failures` times the per-failure cooldown, saturating at `Duration::MAX`.
    fn cooldown(&self, policy: &HealthPolicy) -> Duration {
        policy
            .cooldown_per_failure
            .checked_mul(self.consecutive_failures)
            .unwrap_or(Duration::MAX)
    }
}

fn elapsed_since(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Debug, Default)]
pub struct HealthTracker {
    policy: HealthPolicy,
    entries: Mutex<HashMap<ProviderId, ProviderHealth>>,
}

impl HealthTracker {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    fn with_entry<R>(&self, id: ProviderId, f: impl FnOnce(&mut ProviderHealth) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        f(entries.entry(id).or_default())
    }

    pub fn record_success(&self, id: ProviderId, elapsed: Duration) {
        self.with_entry(id, |h| {
            h.track_latency(elapsed);
            h.consecutive_failures = 0;
            h.last_success = Some(Utc::now());
        });
    }

    pub fn record_failure(&self, id: ProviderId, elapsed: Duration, error: &LlmError) {
        let now = Utc::now();
        let policy = &self.policy;
        let streak = self.with_entry(id, |h| {
            h.expire(policy, now);
            h.track_latency(elapsed);
            h.total_failures += 1;
            h.consecutive_failures += 1;
            h.last_failure = Some(now);
            h.last_error = Some(error.to_string());
            h.consecutive_failures
        });
        if streak == policy.failure_threshold {
            tracing::warn!(provider = %id, failures = streak, "Provider marked unhealthy");
        }
    }

    /// Whether `id` may be tried as a fallback candidate now.
    pub fn is_available(&self, id: ProviderId) -> bool {
        self.is_available_at(id, Utc::now())
    }

    pub(crate) fn is_available_at(&self, id: ProviderId, now: DateTime<Utc>) -> bool {
        if !self.policy.enabled {
            return true;
        }
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&id)
            .is_none_or(|h| h.is_available_at(&self.policy, now))
    }

    pub fn get(&self, id: ProviderId) -> Option<ProviderHealth> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&id).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<ProviderId, ProviderHealth> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    pub fn reset(&self, id: ProviderId) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&id);
    }

    pub fn reset_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}
