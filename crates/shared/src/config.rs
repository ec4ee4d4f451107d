//! Configuration management for the anime browser.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Upstream API settings
    pub api: ApiConfig,

    /// Request timeout and retry settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Response cache settings
    pub cache: CacheConfig,

    /// Router settings
    #[serde(default)]
    pub router: RouterConfig,

    /// View settings
    #[serde(default)]
    pub views: ViewsConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Jikan API base URL (including the version prefix)
    pub jikan_base_url: String,

    /// Anime quotes API base URL
    pub quotes_base_url: String,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Resilient fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Backoff before each retry, in milliseconds. Its length is the retry count.
    pub backoff_ms: Vec<u64>,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist cache entries to disk (memory-only when disabled)
    pub enabled: bool,

    /// Cache database file (relative to data directory or absolute)
    pub database: String,

    /// Expiration used when a caller does not pick one
    pub default_ttl_seconds: u64,
}

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Route shown for an empty or unknown fragment
    pub default_route: String,
}

/// View configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Number of currently airing anime shown on the home view
    pub featured_limit: usize,

    /// Quotes per page on the quotes view
    pub quotes_per_page: usize,

    /// Minimum time the quotes loading placeholder stays visible
    pub quotes_min_loading_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            backoff_ms: vec![500, 1000, 2000],
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_route: "#/home".to_string(),
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            featured_limit: 12,
            quotes_per_page: 18,
            quotes_min_loading_ms: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: false,
                file: true,
                json_format: false,
            },
            api: ApiConfig {
                jikan_base_url: "https://api.jikan.moe/v4".to_string(),
                quotes_base_url: "https://yurippe.vercel.app/api".to_string(),
                user_agent: "anime-browser/0.1.0".to_string(),
            },
            fetch: FetchConfig::default(),
            cache: CacheConfig {
                enabled: true,
                database: "cache.db".to_string(),
                default_ttl_seconds: 3600,
            },
            router: RouterConfig::default(),
            views: ViewsConfig::default(),
        }
    }
}

impl FetchConfig {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Backoff schedule
    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_ms.iter().copied().map(Duration::from_millis).collect()
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the path for the cache database
    pub fn cache_database_path(&self) -> PathBuf {
        self.resolve(&self.cache.database)
    }

    /// Default cache expiration
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_seconds)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
