//! Configuration management for kb-exporter
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Command-line flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page fetching configuration
    pub fetcher: FetcherConfig,

    /// Page cache configuration
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Page fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User agent string
    pub user_agent: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second)
    pub rate_limit: u32,

    /// DevTools endpoint of the scripted browser
    pub browser_endpoint: String,

    /// Navigation timeout in seconds for the scripted browser
    pub browser_timeout_secs: u64,

    /// Navigation attempts before a browser timeout is fatal
    pub browser_max_attempts: u32,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether fetched pages are cached on disk
    pub enabled: bool,

    /// Cache directory
    pub directory: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("kb-exporter/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            rate_limit: 5,
            browser_endpoint: String::from("http://localhost:9222"),
            browser_timeout_secs: 60,
            browser_max_attempts: 3,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from(".cache/pages"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let user_agent = std::env::var("KB_EXPORTER_USER_AGENT")
            .unwrap_or(defaults.fetcher.user_agent);

        let request_timeout_secs = env_parse("KB_EXPORTER_REQUEST_TIMEOUT")
            .unwrap_or(defaults.fetcher.request_timeout_secs);

        let rate_limit =
            env_parse("KB_EXPORTER_RATE_LIMIT").unwrap_or(defaults.fetcher.rate_limit);

        let browser_endpoint = std::env::var("KB_EXPORTER_BROWSER_ENDPOINT")
            .unwrap_or(defaults.fetcher.browser_endpoint);

        let browser_timeout_secs = env_parse("KB_EXPORTER_BROWSER_TIMEOUT")
            .unwrap_or(defaults.fetcher.browser_timeout_secs);

        let browser_max_attempts = env_parse("KB_EXPORTER_BROWSER_MAX_ATTEMPTS")
            .unwrap_or(defaults.fetcher.browser_max_attempts);

        let cache_directory = std::env::var("KB_EXPORTER_CACHE_DIR").ok().map(PathBuf::from);
        let cache_enabled = env_parse::<bool>("KB_EXPORTER_CACHE_ENABLED")
            .unwrap_or(cache_directory.is_some());

        let log_level =
            std::env::var("KB_EXPORTER_LOG_LEVEL").unwrap_or(defaults.logging.level);

        let log_format =
            std::env::var("KB_EXPORTER_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            fetcher: FetcherConfig {
                user_agent,
                request_timeout_secs,
                rate_limit,
                browser_endpoint,
                browser_timeout_secs,
                browser_max_attempts,
            },
            cache: CacheConfig {
                enabled: cache_enabled,
                directory: cache_directory.unwrap_or(defaults.cache.directory),
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.rate_limit == 0 {
            anyhow::bail!("rate_limit must be greater than 0");
        }

        if self.fetcher.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.fetcher.browser_timeout_secs == 0 {
            anyhow::bail!("browser_timeout_secs must be greater than 0");
        }

        if self.fetcher.browser_max_attempts == 0 {
            anyhow::bail!("browser_max_attempts must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be `text` or `json`");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetcher.request_timeout_secs)
    }

    /// Get browser navigation timeout as Duration
    #[must_use]
    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.fetcher.browser_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.cache.enabled);
        assert_eq!(config.fetcher.browser_max_attempts, 3);
    }

    #[test]
    fn test_invalid_rate_limit() {
        let mut config = Config::default();
        config.fetcher.rate_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = String::from("xml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.browser_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetcher]
            rate_limit = 2

            [cache]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.fetcher.rate_limit, 2);
        assert_eq!(config.fetcher.request_timeout_secs, 30);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.directory, PathBuf::from(".cache/pages"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb-exporter.toml");
        std::fs::write(&path, "[logging]\nformat = \"json\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }
}
