//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation collecting every error found

mod defaults;
mod types;
pub mod validation;

pub use types::{
    BotConfig, ChannelsConfig, Config, ConfigError, DatabaseConfig, IrcConfig, ServerConfig,
    StorageBackend, StorageConfig, VacuumStrategy,
};
pub use validation::{ValidationError, validate};
