//! Delay between fallback attempts.
//!
//! The orchestrator never retries the same provider; when a [`BackoffPolicy`] is set it
//! waits before moving on to each further candidate of a fallback walk.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first fallback attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
    /// Maximum jitter percentage (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub const fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before fallback attempt number `attempt` (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base_delay.min(self.max_delay.as_millis() as f64);
        let delay = Duration::from_millis(capped as u64);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        if jitter_range <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let new_delay = delay.as_millis() as f64 + jitter;
        Duration::from_millis(new_delay.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_and_capped() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500))
            .with_jitter(false);

        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(500));
        assert_eq!(policy.calculate_delay(40), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_millis(1000))
            .with_jitter_factor(0.1);
        for _ in 0..50 {
            let d = policy.calculate_delay(0).as_millis();
            assert!((900..=1100).contains(&d), "delay {d} out of range");
        }
    }
}
