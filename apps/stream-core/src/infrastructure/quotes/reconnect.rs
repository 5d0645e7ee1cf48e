//! Reconnection Backoff Policy
//!
//! Capped exponential backoff with jitter for the live quote link. Each
//! failed or dropped connection doubles the delay up to a cap; a successful
//! connection resets the policy so real connectivity recovers quickly.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::QuoteSyncSettings;

/// Configuration for the backoff policy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Growth factor per attempt (2.0 doubles the delay each time).
    pub multiplier: f64,
    /// Jitter fraction applied to each delay (0.1 = plus or minus 10%).
    pub jitter_factor: f64,
    /// Maximum number of attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl BackoffConfig {
    /// Build a config from the quote synchronizer settings.
    #[must_use]
    pub const fn from_settings(settings: &QuoteSyncSettings) -> Self {
        Self {
            base_delay: settings.initial_backoff,
            max_delay: settings.max_backoff,
            multiplier: settings.backoff_multiplier,
            jitter_factor: settings.jitter_factor,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Capped exponential backoff with jitter.
///
/// The delay for attempt `n` (zero-based) is
/// `min(base_delay * multiplier^n, max_delay)`, jittered.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    attempt: u32,
}

impl BackoffPolicy {
    /// Create a fresh policy.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next attempt, or `None` once the attempt
    /// budget is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let base = self.config.base_delay.as_millis() as f64;
        #[allow(clippy::cast_precision_loss)]
        let cap = self.config.max_delay.as_millis() as f64;
        #[allow(clippy::cast_possible_wrap)]
        let scaled = base * self.config.multiplier.powi(self.attempt as i32);

        self.attempt += 1;

        Some(self.jittered(scaled.min(cap)))
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt
    }

    /// Apply jitter to a delay, keeping it at least one millisecond.
    fn jittered(&self, millis: f64) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Duration::from_millis(millis as u64);
        }

        let range = millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-range..=range);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis((millis + jitter).max(1.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(base_ms: u64, max_ms: u64, max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy::new(BackoffConfig {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        })
    }

    #[test]
    fn delays_grow_strictly_until_the_cap() {
        let mut policy = no_jitter(100, 10_000, 0);

        let mut previous = Duration::ZERO;
        for expected in [100u64, 200, 400, 800, 1600] {
            let delay = policy.next_delay().unwrap();
            assert_eq!(delay, Duration::from_millis(expected));
            assert!(delay > previous);
            previous = delay;
        }
    }

    #[test]
    fn delays_are_capped_at_max() {
        let mut policy = no_jitter(1000, 2000, 0);

        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(1000));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(2000));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(2000));
    }

    #[test]
    fn reset_returns_to_base_delay() {
        let mut policy = no_jitter(100, 10_000, 0);
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn attempt_budget_is_enforced() {
        let mut policy = no_jitter(100, 1000, 3);

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn zero_max_attempts_means_unlimited() {
        let mut policy = no_jitter(1, 10, 0);
        for _ in 0..500 {
            assert!(policy.next_delay().is_some());
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = BackoffPolicy::new(BackoffConfig {
                base_delay: Duration::from_millis(1000),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                jitter_factor: 0.1,
                max_attempts: 0,
            });

            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of bounds");
        }
    }

    #[test]
    fn default_config_matches_baseline() {
        let config = BackoffConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 0);
    }
}
