//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 2790))
}

// =============================================================================
// IRC Defaults
// =============================================================================

pub fn default_irc_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

pub fn default_irc_port() -> u16 {
    6667
}

/// Anonymous, read-only login.
pub fn default_irc_username() -> String {
    "justinfan12345".to_string()
}

pub fn default_join_timeout_secs() -> u64 {
    10
}

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_bot_username() -> String {
    "recent_messages".to_string()
}

// =============================================================================
// Storage Defaults
// =============================================================================

pub fn default_storage_path() -> String {
    "messages.redb".to_string()
}

pub fn default_buffer_size() -> usize {
    500
}

pub fn default_expiry_interval_secs() -> u64 {
    300
}

// =============================================================================
// Database Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "recent-messages.db".to_string()
}

// =============================================================================
// Channel Defaults
// =============================================================================

/// One week.
pub fn default_channel_expiry_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// 30 minutes.
pub fn default_vacuum_interval_secs() -> u64 {
    30 * 60
}
