//! File-based configuration.
//!
//! Every section and field is optional; missing values fall back to the
//! same defaults the builder-style configs use. Durations are written as
//! integer milliseconds (`*_ms`) or seconds (`*_secs`).
//!
//! ```toml
//! [client]
//! base_url = "https://api.example.com"
//!
//! [dispatch]
//! slow_threshold_ms = 5000
//!
//! [retry]
//! max_retries = 2
//!
//! [translation]
//! supported_languages = ["ko", "en", "ja"]
//! cache_max_entries = 1000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::dispatch::DispatchConfig;
use crate::retry::RetryConfig;
use crate::session::SessionConfig;
use crate::translate::TranslationConfig;
use crate::{HermodError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub stats: StatsSection,
    #[serde(default)]
    pub translation: TranslationSection,
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HermodError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HermodError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        let d = &self.dispatch;
        DispatchConfig::new()
            .slow_threshold(Duration::from_millis(d.slow_threshold_ms))
            .flight_ttl(Duration::from_millis(d.flight_ttl_ms))
            .error_log_capacity(d.error_log_capacity)
    }

    pub fn retry_config(&self) -> RetryConfig {
        let r = &self.retry;
        RetryConfig::new()
            .max_retries(r.max_retries)
            .base_delay(Duration::from_millis(r.base_delay_ms))
            .max_delay(Duration::from_millis(r.max_delay_ms))
    }

    pub fn session_config(&self) -> SessionConfig {
        let s = &self.session;
        let config = SessionConfig::new()
            .login_path(s.login_path.clone())
            .redirect_delay(Duration::from_millis(s.redirect_delay_ms));
        match &s.expired_message {
            Some(message) => config.expired_message(message.clone()),
            None => config,
        }
    }

    pub fn stats_window(&self) -> Duration {
        Duration::from_secs(self.stats.window_secs)
    }

    pub fn translation_config(&self) -> TranslationConfig {
        let t = &self.translation;
        TranslationConfig::new()
            .default_source(t.default_source.clone())
            .default_language(t.default_language.clone())
            .supported_languages(t.supported_languages.iter().cloned())
            .min_detect_length(t.min_detect_length)
            .content_type(t.content_type.clone())
            .cache(
                CacheConfig::new()
                    .max_entries(t.cache_max_entries)
                    .ttl(Duration::from_secs(t.cache_ttl_secs))
                    .sweep_interval(Duration::from_secs(t.sweep_interval_secs)),
            )
    }
}

/// Remote service settings, used by the bundled reqwest adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    /// Base URL of the remote service. No default.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSection {
    /// Slow-operation threshold (default: 3000).
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
    /// Single-flight safety TTL (default: 30000).
    #[serde(default = "default_flight_ttl_ms")]
    pub flight_ttl_ms: u64,
    /// Error records kept for inspection (default: 50).
    #[serde(default = "default_error_log_capacity")]
    pub error_log_capacity: usize,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            slow_threshold_ms: default_slow_threshold_ms(),
            flight_ttl_ms: default_flight_ttl_ms(),
            error_log_capacity: default_error_log_capacity(),
        }
    }
}

fn default_slow_threshold_ms() -> u64 {
    3_000
}

fn default_flight_ttl_ms() -> u64 {
    30_000
}

fn default_error_log_capacity() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Retries after the initial attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// Login route (default: `/login`).
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Delay before redirecting (default: 2000).
    #[serde(default = "default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,
    #[serde(default)]
    pub expired_message: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            redirect_delay_ms: default_redirect_delay_ms(),
            expired_message: None,
        }
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_redirect_delay_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsSection {
    /// Statistics window (default: 3600).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for StatsSection {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
        }
    }
}

fn default_window_secs() -> u64 {
    3_600
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationSection {
    #[serde(default = "default_lang")]
    pub default_source: String,
    #[serde(default = "default_lang")]
    pub default_language: String,
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,
    #[serde(default = "default_min_detect_length")]
    pub min_detect_length: usize,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Entries per cache (default: 500).
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// Cache entry expiry (default: 86400).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Sweep period (default: 3600).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for TranslationSection {
    fn default() -> Self {
        Self {
            default_source: default_lang(),
            default_language: default_lang(),
            supported_languages: default_supported_languages(),
            min_detect_length: default_min_detect_length(),
            content_type: default_content_type(),
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_lang() -> String {
    "ko".to_string()
}

fn default_supported_languages() -> Vec<String> {
    TranslationConfig::default().supported_languages
}

fn default_min_detect_length() -> usize {
    3
}

fn default_content_type() -> String {
    "general".to_string()
}

fn default_cache_max_entries() -> usize {
    500
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_matches_builder_defaults() {
        let config = Config::from_toml_str("").unwrap();
        let retry = config.retry_config();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.base_delay, Duration::from_secs(1));
        assert_eq!(
            config.dispatch_config().slow_threshold,
            Duration::from_millis(3_000)
        );
        assert_eq!(config.stats_window(), Duration::from_secs(3_600));
        let translation = config.translation_config();
        assert_eq!(translation.cache.max_entries, 500);
        assert!(translation.is_supported("ja"));
        assert!(config.client.base_url.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [retry]
            max_retries = 1

            [session]
            login_path = "/signin"
            expired_message = "Please log in"
            "#,
        )
        .unwrap();
        assert_eq!(config.retry_config().max_retries, 1);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        let session = config.session_config();
        assert_eq!(session.login_path, "/signin");
        assert_eq!(session.expired_message, "Please log in");
        assert_eq!(session.redirect_delay, Duration::from_secs(2));
    }

    #[test]
    fn sweep_interval_is_independent_of_stats_window() {
        let config = Config::from_toml_str(
            r#"
            [stats]
            window_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.stats_window(), Duration::from_secs(60));
        assert_eq!(
            config.translation_config().cache.sweep_interval,
            Duration::from_secs(3_600)
        );
    }

    #[test]
    fn invalid_toml_is_a_configuration_error() {
        let err = Config::from_toml_str("[retry]\nmax_retries = \"three\"").unwrap_err();
        assert!(matches!(err, HermodError::Configuration(_)));
    }
}
