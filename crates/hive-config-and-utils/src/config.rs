//! Configuration management for the HiveBooks client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend API base URL (can be overridden at compile time via HIVE_API_URL env var).
pub const DEFAULT_API_URL: &str = match option_env!("HIVE_API_URL") {
    Some(url) => url,
    None => "http://localhost:8080/api",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default timeout applied to every backend request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Retry policy for the background identity fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total number of fetch attempts, including the first, before the
    /// credential is invalidated. Zero behaves as one.
    pub max_retries: u32,
    /// Initial delay between attempts in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 250,
            max_delay_ms: 2000,
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend API base URL, e.g. `http://localhost:8080/api`.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Timeout for each backend request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retry policy for identity fetches that fail transiently.
    #[serde(default)]
    pub identity_retry: RetrySettings,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_url: default_api_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            identity_retry: RetrySettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables take precedence over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from process environment variables.
    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognized variables: `HIVE_API_URL`, `HIVE_LOG_LEVEL`,
    /// `HIVE_REQUEST_TIMEOUT_SECS`. Empty values are ignored, as are
    /// timeouts that do not parse as a positive integer.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(api_url) = non_empty("HIVE_API_URL") {
            self.api_url = api_url;
        }
        if let Some(log_level) = non_empty("HIVE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(timeout) = non_empty("HIVE_REQUEST_TIMEOUT_SECS")
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            self.request_timeout_secs = timeout;
        }
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// Per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
