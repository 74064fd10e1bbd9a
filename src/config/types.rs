//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub irc: IrcConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Serve Prometheus metrics on `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_enabled: true,
        }
    }
}

/// Chat feed connection.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    #[serde(default = "default_irc_host")]
    pub host: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    #[serde(default = "default_irc_username")]
    pub username: String,
    /// `oauth:` token. Not needed for anonymous logins.
    pub password: Option<String>,
    /// How long to wait for the server to confirm a JOIN.
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: default_irc_host(),
            port: default_irc_port(),
            username: default_irc_username(),
            password: None,
            join_timeout_secs: default_join_timeout_secs(),
        }
    }
}

impl IrcConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

/// Interactive command bot. Connects with its own login and listens in its
/// own channel.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bot_username")]
    pub username: String,
    pub password: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            username: default_bot_username(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Durable embedded store.
    #[default]
    Redb,
    /// In-process only, lost on restart.
    Memory,
}

/// Message log storage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Path of the redb file.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Messages kept per channel.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Drop messages older than this. Unset keeps them until evicted.
    pub message_expiry_secs: Option<u64>,
    #[serde(default = "default_expiry_interval_secs")]
    pub expiry_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            buffer_size: default_buffer_size(),
            message_expiry_secs: None,
            expiry_interval_secs: default_expiry_interval_secs(),
        }
    }
}

impl StorageConfig {
    pub fn message_expiry(&self) -> Option<Duration> {
        self.message_expiry_secs.map(Duration::from_secs)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_secs)
    }
}

/// Channel registry database.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// How the vacuum loop finds channels to retire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VacuumStrategy {
    /// Recompute the full ignored-or-stagnant set every run.
    #[default]
    Rescan,
    /// Only channels that went stagnant since the previous run, measured on
    /// the registry clock.
    Windowed,
}

/// Channel lifecycle.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsConfig {
    /// Channels not read for this long are parted and purged.
    #[serde(default = "default_channel_expiry_secs")]
    pub expiry_secs: u64,
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
    #[serde(default)]
    pub vacuum_strategy: VacuumStrategy,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_channel_expiry_secs(),
            vacuum_interval_secs: default_vacuum_interval_secs(),
            vacuum_strategy: VacuumStrategy::default(),
        }
    }
}

impl ChannelsConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    pub fn vacuum_interval(&self) -> Duration {
        Duration::from_secs(self.vacuum_interval_secs)
    }
}
