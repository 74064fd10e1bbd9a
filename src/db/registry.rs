//! The registry seam used by the lifecycle controller, the read path and the
//! bot, implemented over SQLite.

use super::{Database, DbError};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Current time on the registry clock, in milliseconds.
    async fn server_timestamp(&self) -> Result<i64, DbError>;

    /// Channels to (re)join at startup, and the registry time of the query.
    async fn channels_to_join(&self) -> Result<(Vec<String>, i64), DbError>;

    /// Every ignored or stagnant channel.
    async fn channels_to_vacuum(&self) -> Result<Vec<String>, DbError>;

    /// Channels that went stagnant after `since`, and the registry time to
    /// use as the next `since`.
    async fn channels_to_part(&self, since: i64) -> Result<(Vec<String>, i64), DbError>;

    async fn touch_or_add(&self, channel: &str) -> Result<bool, DbError>;

    async fn set_ignore_status(&self, channel: &str, ignored: bool) -> Result<bool, DbError>;

    async fn is_ignored(&self, channel: &str) -> Result<bool, DbError>;
}

/// [`ChannelRegistry`] over the SQLite [`Database`], with a fixed expiry window.
#[derive(Clone)]
pub struct SqliteRegistry {
    db: Database,
    expiry_ms: i64,
}

impl SqliteRegistry {
    pub fn new(db: Database, channel_expiry: Duration) -> Self {
        Self {
            db,
            expiry_ms: i64::try_from(channel_expiry.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

#[async_trait]
impl ChannelRegistry for SqliteRegistry {
    async fn server_timestamp(&self) -> Result<i64, DbError> {
        self.db.channels().server_timestamp().await
    }

    async fn channels_to_join(&self) -> Result<(Vec<String>, i64), DbError> {
        self.db.channels().channels_to_join(self.expiry_ms).await
    }

    async fn channels_to_vacuum(&self) -> Result<Vec<String>, DbError> {
        self.db.channels().channels_to_vacuum(self.expiry_ms).await
    }

    async fn channels_to_part(&self, since: i64) -> Result<(Vec<String>, i64), DbError> {
        self.db.channels().channels_to_part(since, self.expiry_ms).await
    }

    async fn touch_or_add(&self, channel: &str) -> Result<bool, DbError> {
        self.db.channels().touch_or_add(channel).await
    }

    async fn set_ignore_status(&self, channel: &str, ignored: bool) -> Result<bool, DbError> {
        self.db.channels().set_ignore_status(channel, ignored).await
    }

    async fn is_ignored(&self, channel: &str) -> Result<bool, DbError> {
        self.db.channels().is_ignored(channel).await
    }
}
