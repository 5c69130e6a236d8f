use std::env;
use std::time::Duration;

use foundation::Coordinate;
use serde::{Deserialize, Serialize};

use crate::location::PositionOptions;

/// Runtime configuration of the feed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Prefix of every content endpoint, without a trailing slash.
    pub base_url: String,
    /// Search radius in degrees sent with "around" fetches.
    pub radius_deg: f64,
    pub location_timeout_ms: u64,
    pub high_accuracy: bool,
    pub request_timeout_ms: u64,
    pub bearer_token: Option<String>,
    /// Map centre shown before the device location resolves.
    pub fallback_center: Coordinate,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            radius_deg: 0.01,
            location_timeout_ms: 10_000,
            high_accuracy: true,
            request_timeout_ms: 15_000,
            bearer_token: None,
            fallback_center: Coordinate::new(35.157171, 136.918320),
        }
    }
}

impl FeedConfig {
    /// Defaults overridden by `FEED_*` environment variables.
    ///
    /// Unset or unparsable variables keep the default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: env::var("FEED_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.base_url),
            radius_deg: env_var_f64("FEED_RADIUS_DEG", d.radius_deg),
            location_timeout_ms: env_var_u64("FEED_LOCATION_TIMEOUT_MS", d.location_timeout_ms),
            high_accuracy: env_var_bool("FEED_HIGH_ACCURACY", d.high_accuracy),
            request_timeout_ms: env_var_u64("FEED_REQUEST_TIMEOUT_MS", d.request_timeout_ms),
            bearer_token: env::var("FEED_TOKEN").ok().filter(|t| !t.is_empty()),
            fallback_center: d.fallback_center,
        }
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.location_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Radius to send, or `None` to let the backend use its own default.
    pub fn radius(&self) -> Option<f64> {
        (self.radius_deg.is_finite() && self.radius_deg > 0.0).then_some(self.radius_deg)
    }
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_bool(key: &str, default: bool) -> bool {
    match env::var(key).ok().as_deref().map(str::trim) {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn defaults_match_backend() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.radius(), Some(0.01));
        assert_eq!(cfg.position_options().timeout, Duration::from_secs(10));
        assert!(cfg.position_options().high_accuracy);
        assert!(cfg.bearer_token.is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: FeedConfig =
            serde_json::from_str(r#"{"base_url":"https://example.test/api","radius_deg":0}"#)
                .unwrap();
        assert_eq!(cfg.base_url, "https://example.test/api");
        assert_eq!(cfg.radius(), None);
        assert_eq!(cfg.request_timeout_ms, 15_000);
    }

    #[test]
    fn helpers_keep_defaults_for_unset_vars() {
        assert!(env_var_bool("FEED_TEST_UNSET_BOOL_VAR", true));
        assert_eq!(env_var_u64("FEED_TEST_UNSET_U64_VAR", 7), 7);
    }

    // Process environment is global; tests that mutate it take this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "FEED_BASE_URL",
        "FEED_RADIUS_DEG",
        "FEED_LOCATION_TIMEOUT_MS",
        "FEED_HIGH_ACCURACY",
        "FEED_REQUEST_TIMEOUT_MS",
        "FEED_TOKEN",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock();
        // SAFETY: serialized by ENV_LOCK and reset before the lock is released.
        unsafe {
            for key in VARS {
                env::remove_var(key);
            }
            for (key, value) in vars {
                env::set_var(key, value);
            }
        }
        let out = f();
        unsafe {
            for key in VARS {
                env::remove_var(key);
            }
        }
        out
    }

    #[test]
    fn garbage_env_values_keep_defaults() {
        let cfg = with_env(
            &[
                ("FEED_HIGH_ACCURACY", "maybe"),
                ("FEED_RADIUS_DEG", "abc"),
                ("FEED_LOCATION_TIMEOUT_MS", "-5"),
                ("FEED_TOKEN", ""),
                ("FEED_BASE_URL", "http://x/"),
            ],
            FeedConfig::from_env,
        );
        let d = FeedConfig::default();
        assert_eq!(cfg.base_url, "http://x");
        assert_eq!(cfg.high_accuracy, d.high_accuracy);
        assert_eq!(cfg.radius_deg, d.radius_deg);
        assert_eq!(cfg.location_timeout_ms, d.location_timeout_ms);
        assert_eq!(cfg.bearer_token, None);
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = with_env(
            &[
                ("FEED_HIGH_ACCURACY", "off"),
                ("FEED_RADIUS_DEG", "0.05"),
                ("FEED_REQUEST_TIMEOUT_MS", "2500"),
                ("FEED_TOKEN", "secret"),
            ],
            FeedConfig::from_env,
        );
        assert_eq!(cfg.base_url, FeedConfig::default().base_url);
        assert!(!cfg.high_accuracy);
        assert_eq!(cfg.radius(), Some(0.05));
        assert_eq!(cfg.request_timeout(), Duration::from_millis(2500));
        assert_eq!(cfg.bearer_token.as_deref(), Some("secret"));
    }
}
