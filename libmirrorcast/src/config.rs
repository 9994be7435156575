//! Configuration management for Mirrorcast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheStore, JsonCacheStore, SqliteCacheStore};
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub mastodon: Option<MastodonConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Handle of the account being mirrored
    pub username: String,
    /// JSON feed dump of the account, newest first
    pub feed_file: String,
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub enabled: bool,
    pub instance: String,
    pub token_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Lookback horizon, humantime format (e.g. "1day", "6h")
    #[serde(default = "default_window")]
    pub window: String,
    /// Delay between cycles, humantime format
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl SyncConfig {
    pub fn window(&self) -> Result<Duration> {
        parse_duration("sync.window", &self.window)
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration("sync.poll_interval", &self.poll_interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    pub path: String,
}

impl CacheConfig {
    /// Open the configured cache store
    pub async fn open_store(&self) -> Result<Box<dyn CacheStore>> {
        let store: Box<dyn CacheStore> = match self.backend {
            CacheBackend::Json => Box::new(JsonCacheStore::new(&self.path)),
            CacheBackend::Sqlite => Box::new(SqliteCacheStore::new(&self.path).await?),
        };
        Ok(store)
    }
}

fn default_max_posts() -> usize {
    50
}

fn default_window() -> String {
    "1day".to_string()
}

fn default_poll_interval() -> String {
    "5m".to_string()
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a duration ({})", value, e),
        }
        .into()
    })
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.source.username.trim().is_empty() {
            return Err(ConfigError::MissingField("source.username".to_string()).into());
        }

        if self.source.max_posts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "source.max_posts".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if self.sync.window()?.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sync.window".to_string(),
                reason: "must be longer than zero".to_string(),
            }
            .into());
        }

        self.sync.poll_interval()?;
        Ok(())
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            source: SourceConfig {
                username: "example".to_string(),
                feed_file: "~/.local/share/mirrorcast/feed.json".to_string(),
                max_posts: default_max_posts(),
            },
            mastodon: Some(MastodonConfig {
                enabled: true,
                instance: "mastodon.social".to_string(),
                token_file: "~/.config/mirrorcast/mastodon.token".to_string(),
            }),
            sync: SyncConfig::default(),
            cache: CacheConfig {
                backend: CacheBackend::Json,
                path: "~/.local/share/mirrorcast/cache.json".to_string(),
            },
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("MIRRORCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("mirrorcast").join("config.toml"))
}
