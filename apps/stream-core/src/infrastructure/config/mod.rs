//! Client Configuration
//!
//! Settings for the two streaming components, loaded from environment
//! variables with workable local-development defaults. Everything here is
//! configuration, not contract: endpoints and backoff constants can change
//! without touching the components.
//!
//! # Environment Variables
//!
//! - `ADVISOR_PROGRESS_URL`: progress stream endpoint
//! - `ADVISOR_PROGRESS_CONNECT_TIMEOUT_MS`: connect timeout for the stream request
//! - `ADVISOR_QUOTES_URL`: quote feed WebSocket URL
//! - `ADVISOR_QUOTES_ENABLED`: disable the quote link entirely when "false"/"0"
//! - `ADVISOR_QUOTES_BACKOFF_INITIAL_MS`: first reconnect delay
//! - `ADVISOR_QUOTES_BACKOFF_MAX_MS`: reconnect delay cap
//! - `ADVISOR_QUOTES_BACKOFF_MULTIPLIER`: growth factor per attempt
//! - `ADVISOR_QUOTES_MAX_RECONNECT_ATTEMPTS`: attempt budget (0 = unlimited)

use std::time::Duration;

/// Settings for the progress stream consumer.
#[derive(Debug, Clone)]
pub struct ProgressStreamSettings {
    /// Endpoint accepting the batch and returning the event stream.
    pub endpoint: String,
    /// Connect timeout for the streamed request. There is deliberately no
    /// overall request timeout: the body is long-lived.
    pub connect_timeout: Duration,
}

impl Default for ProgressStreamSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8090/api/analysis/stream".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ProgressStreamSettings {
    /// Load settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env_string("ADVISOR_PROGRESS_URL", defaults.endpoint),
            connect_timeout: env_duration_ms(
                "ADVISOR_PROGRESS_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout,
            ),
        }
    }
}

/// Settings for the live quote synchronizer.
#[derive(Debug, Clone)]
pub struct QuoteSyncSettings {
    /// WebSocket URL of the price feed.
    pub url: String,
    /// Whether the quote link runs at all.
    pub enabled: bool,
    /// Delay before the first reconnection attempt.
    pub initial_backoff: Duration,
    /// Cap on the reconnection delay.
    pub max_backoff: Duration,
    /// Backoff growth factor per attempt.
    pub backoff_multiplier: f64,
    /// Jitter fraction applied to each delay.
    pub jitter_factor: f64,
    /// Maximum reconnection attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for QuoteSyncSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8090/ws/quotes".to_string(),
            enabled: true,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            max_reconnect_attempts: 0,
        }
    }
}

impl QuoteSyncSettings {
    /// Load settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env_string("ADVISOR_QUOTES_URL", defaults.url),
            enabled: env_flag("ADVISOR_QUOTES_ENABLED", defaults.enabled),
            initial_backoff: env_duration_ms(
                "ADVISOR_QUOTES_BACKOFF_INITIAL_MS",
                defaults.initial_backoff,
            ),
            max_backoff: env_duration_ms("ADVISOR_QUOTES_BACKOFF_MAX_MS", defaults.max_backoff),
            backoff_multiplier: env_f64(
                "ADVISOR_QUOTES_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            ),
            jitter_factor: defaults.jitter_factor,
            max_reconnect_attempts: env_u32(
                "ADVISOR_QUOTES_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        }
    }
}

/// Root settings for the streaming core.
#[derive(Debug, Clone, Default)]
pub struct CoreSettings {
    /// Progress stream consumer settings.
    pub progress: ProgressStreamSettings,
    /// Quote synchronizer settings.
    pub quotes: QuoteSyncSettings,
}

impl CoreSettings {
    /// Load all settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            progress: ProgressStreamSettings::from_env(),
            quotes: QuoteSyncSettings::from_env(),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map_or(default, |v| v.to_lowercase() != "false" && v != "0")
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = CoreSettings::default();
        assert!(settings.progress.endpoint.starts_with("http://"));
        assert!(settings.quotes.url.starts_with("ws://"));
        assert!(settings.quotes.enabled);
        assert_eq!(settings.quotes.initial_backoff, Duration::from_secs(1));
        assert_eq!(settings.quotes.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn flag_parsing() {
        assert!(env_flag("ADVISOR_TEST_UNSET_FLAG", true));
        assert!(!env_flag("ADVISOR_TEST_UNSET_FLAG", false));
    }
}
