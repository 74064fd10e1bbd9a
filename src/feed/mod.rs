//! Live chat feed.
//!
//! [`FeedConnection`] is the seam between the service and the chat network:
//! join and part channels, inspect the joined/wanted sets, and send chat
//! lines. [`TmiClient`] implements it over a plain TMI connection; the
//! [`forward`] task appends every inbound channel line to the message store.

mod client;
pub mod forward;

pub use client::{FeedSettings, TmiClient};

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;
use tmi_proto::ProtocolError;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The chat server refused or never confirmed the join. The message is
    /// suitable for showing to an end user.
    #[error("{reason}")]
    Join { channel: String, reason: String },
    #[error("feed connection is shut down")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    pub fn join(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        FeedError::Join {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait FeedConnection: Send + Sync {
    /// Join `channel` and wait until the server confirms or refuses.
    async fn join(&self, channel: &str) -> Result<(), FeedError>;

    /// Leave `channel`. Does not wait for confirmation.
    async fn part(&self, channel: &str) -> Result<(), FeedError>;

    /// Send a chat line to `channel`.
    async fn say(&self, channel: &str, text: &str) -> Result<(), FeedError>;

    /// Channels the server has confirmed we are in.
    fn joined_channels(&self) -> BTreeSet<String>;

    /// Channels we are in or are trying to get into.
    fn wanted_channels(&self) -> BTreeSet<String>;
}
