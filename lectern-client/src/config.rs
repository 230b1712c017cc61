//! Configuration loading for the Lectern client.
//!
//! The TOML file supplies every required field. Deployment environment
//! variables (`VITE_*`) override the file after it is parsed, then the
//! merged result is validated.

use crate::watch::TrackerConfig;
use lectern_cache::CacheConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_SERVER: &str = "VITE_LMS_API_SERVER";
pub const ENV_USER_MESSAGE_URL: &str = "VITE_USER_MESSAGE_URL";
pub const ENV_ASSET_URL_BASE: &str = "VITE_ASSET_URL_BASE";
pub const ENV_ASSET_MAX_SIZE_MB: &str = "VITE_ASSET_MAX_SIZE_MB";
pub const ENV_ASSET_SIZE_LIMIT_MB: &str = "VITE_ASSET_SIZE_LIMIT_MB";
pub const ENV_AI_CHAT_ENABLED: &str = "VITE_AI_CHAT_ENABLED";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    pub api_server: String,
    /// Host (optionally with scheme) of the user message socket.
    pub user_message_url: String,
    #[serde(default)]
    pub asset_url_base: Option<String>,
    pub asset_max_size_mb: u64,
    pub asset_size_limit_mb: u64,
    #[serde(default)]
    pub ai_chat_enabled: bool,
    pub request_timeout_ms: u64,
    /// JSON file holding `user`, `loginExpire` and `mode`.
    pub store_path: PathBuf,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub notifications: NotificationSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheSection {
    pub max_staleness_secs: u64,
    pub optimistic_window_secs: u64,
    pub page_size: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_staleness_secs: 300,
            optimistic_window_secs: 30,
            page_size: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrackerSection {
    pub throttle_ms: u64,
    pub persist_interval_secs: u64,
    pub max_duration_secs: f64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            throttle_ms: 500,
            persist_interval_secs: 10,
            max_duration_secs: lectern_core::MAX_TRACKED_DURATION_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotificationSection {
    pub reconnect_delay_ms: u64,
    /// Force `wss` when the configured URL carries no scheme.
    pub secure: bool,
    /// Capacity of the in-process broadcast channel.
    pub channel_capacity: usize,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5_000,
            secure: true,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or LECTERN_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let mut config = Self::from_path(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from deployment variables. `lookup` is usually
    /// `std::env::var`; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_API_SERVER) {
            self.api_server = value;
        }
        if let Some(value) = lookup(ENV_USER_MESSAGE_URL) {
            self.user_message_url = value;
        }
        if let Some(value) = lookup(ENV_ASSET_URL_BASE) {
            self.asset_url_base = Some(value).filter(|v| !v.trim().is_empty());
        }
        if let Some(value) = lookup(ENV_ASSET_MAX_SIZE_MB) {
            self.asset_max_size_mb = parse_number("asset_max_size_mb", &value)?;
        }
        if let Some(value) = lookup(ENV_ASSET_SIZE_LIMIT_MB) {
            self.asset_size_limit_mb = parse_number("asset_size_limit_mb", &value)?;
        }
        if let Some(value) = lookup(ENV_AI_CHAT_ENABLED) {
            self.ai_chat_enabled = parse_flag("ai_chat_enabled", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_server.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_server",
                reason: "must not be empty".to_string(),
            });
        }
        if self.user_message_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "user_message_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.asset_max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "asset_max_size_mb",
                reason: "must be > 0".to_string(),
            });
        }
        if self.asset_size_limit_mb < self.asset_max_size_mb {
            return Err(ConfigError::InvalidValue {
                field: "asset_size_limit_mb",
                reason: "must be >= asset_max_size_mb".to_string(),
            });
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.page_size",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.max_staleness_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_staleness_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.tracker.throttle_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tracker.throttle_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.tracker.persist_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tracker.persist_interval_secs",
                reason: "must be > 0".to_string(),
            });
        }
        let max_duration = self.tracker.max_duration_secs;
        if max_duration.is_nan() || max_duration <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "tracker.max_duration_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.notifications.reconnect_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notifications.reconnect_delay_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.notifications.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notifications.channel_capacity",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.notifications.reconnect_delay_ms)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_max_staleness(Duration::from_secs(self.cache.max_staleness_secs))
            .with_optimistic_window(Duration::from_secs(self.cache.optimistic_window_secs))
            .with_page_size(self.cache.page_size)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            throttle_window: Duration::from_millis(self.tracker.throttle_ms),
            persist_interval: Duration::from_secs(self.tracker.persist_interval_secs),
            max_duration_secs: self.tracker.max_duration_secs,
            ..TrackerConfig::default()
        }
    }

    /// Upload limit in bytes.
    pub fn asset_max_size_bytes(&self) -> u64 {
        self.asset_max_size_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            field,
            reason: e.to_string(),
        })
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("LECTERN_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
