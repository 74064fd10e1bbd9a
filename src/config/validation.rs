//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("storage.buffer_size must be at least 1")]
    ZeroBufferSize,
    #[error("storage.message_expiry_secs must be greater than 0")]
    ZeroMessageExpiry,
    #[error("storage.expiry_interval_secs must be greater than 0")]
    ZeroExpiryInterval,
    #[error("channels.expiry_secs must be greater than 0")]
    ZeroChannelExpiry,
    #[error("channels.vacuum_interval_secs must be greater than 0")]
    ZeroVacuumInterval,
    #[error("irc.username is required")]
    MissingIrcUsername,
    #[error("bot.password is required when the bot is enabled")]
    MissingBotPassword,
    #[error("bot.username is required when the bot is enabled")]
    MissingBotUsername,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("storage.path parent directory does not exist: {0}")]
    StoragePathInvalid(String),
}

fn parent_missing(path: &str) -> bool {
    Path::new(path)
        .parent()
        .is_some_and(|parent| !parent.as_os_str().is_empty() && !parent.exists())
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.storage.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }
    if config.storage.message_expiry_secs == Some(0) {
        errors.push(ValidationError::ZeroMessageExpiry);
    }
    if config.storage.expiry_interval_secs == 0 {
        errors.push(ValidationError::ZeroExpiryInterval);
    }
    if config.channels.expiry_secs == 0 {
        errors.push(ValidationError::ZeroChannelExpiry);
    }
    if config.channels.vacuum_interval_secs == 0 {
        errors.push(ValidationError::ZeroVacuumInterval);
    }
    if config.irc.username.is_empty() {
        errors.push(ValidationError::MissingIrcUsername);
    }

    if config.bot.enabled {
        if config.bot.username.is_empty() {
            errors.push(ValidationError::MissingBotUsername);
        }
        if config.bot.password.as_deref().is_none_or(str::is_empty) {
            errors.push(ValidationError::MissingBotPassword);
        }
    }

    if parent_missing(&config.database.path) {
        errors.push(ValidationError::DatabasePathInvalid(
            config.database.path.clone(),
        ));
    }
    if config.storage.backend == super::StorageBackend::Redb && parent_missing(&config.storage.path)
    {
        errors.push(ValidationError::StoragePathInvalid(config.storage.path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
