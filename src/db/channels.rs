//! Channel repository.
//!
//! Every time comparison is made against the database clock, read inside the
//! same transaction as the selection it bounds.

use super::DbError;
use sqlx::SqlitePool;

/// Current time on the database clock, in milliseconds since the Unix epoch.
const NOW_MS: &str = "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)";

/// A registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel_name: String,
    pub ignored: bool,
    pub last_access: i64,
}

/// Repository for channel operations.
pub struct ChannelRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ChannelRepository<'a> {
    /// Create a new channel repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Current database time in milliseconds.
    pub async fn server_timestamp(&self) -> Result<i64, DbError> {
        let now: i64 = sqlx::query_scalar(&format!("SELECT {NOW_MS}"))
            .fetch_one(self.pool)
            .await?;
        Ok(now)
    }

    pub async fn find(&self, channel_name: &str) -> Result<Option<ChannelRecord>, DbError> {
        let row = sqlx::query_as::<_, (String, bool, i64)>(
            r#"
            SELECT channel_name, ignored, last_access
            FROM channel
            WHERE channel_name = ?
            "#,
        )
        .bind(channel_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(channel_name, ignored, last_access)| ChannelRecord {
            channel_name,
            ignored,
            last_access,
        }))
    }

    /// Non-ignored channels read within the last `expiry_ms`, together with
    /// the database time the selection was made at.
    pub async fn channels_to_join(&self, expiry_ms: i64) -> Result<(Vec<String>, i64), DbError> {
        let mut tx = self.pool.begin().await?;

        let now: i64 = sqlx::query_scalar(&format!("SELECT {NOW_MS}"))
            .fetch_one(&mut *tx)
            .await?;

        let channels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT channel_name
            FROM channel
            WHERE ignored = 0 AND ? - last_access < ?
            ORDER BY channel_name
            "#,
        )
        .bind(now)
        .bind(expiry_ms)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((channels, now))
    }

    /// Ignored channels plus channels not read within the last `expiry_ms`.
    pub async fn channels_to_vacuum(&self, expiry_ms: i64) -> Result<Vec<String>, DbError> {
        let channels: Vec<String> = sqlx::query_scalar(&format!(
            r#"
            SELECT channel_name
            FROM channel
            WHERE ignored <> 0 OR {NOW_MS} - last_access >= ?
            ORDER BY channel_name
            "#
        ))
        .bind(expiry_ms)
        .fetch_all(self.pool)
        .await?;

        Ok(channels)
    }

    /// Non-ignored channels whose expiry boundary (`last_access + expiry_ms`)
    /// passed after `since` and no later than the current database time.
    /// Returns the channels and that time, to be passed as the next `since`.
    pub async fn channels_to_part(
        &self,
        since: i64,
        expiry_ms: i64,
    ) -> Result<(Vec<String>, i64), DbError> {
        let mut tx = self.pool.begin().await?;

        let now: i64 = sqlx::query_scalar(&format!("SELECT {NOW_MS}"))
            .fetch_one(&mut *tx)
            .await?;

        let channels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT channel_name
            FROM channel
            WHERE ignored = 0
              AND ? - last_access < ?
              AND ? - last_access >= ?
            ORDER BY channel_name
            "#,
        )
        .bind(since)
        .bind(expiry_ms)
        .bind(now)
        .bind(expiry_ms)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((channels, now))
    }

    /// Set `last_access` to the database time, inserting the channel if it is
    /// unknown. Returns whether a row changed.
    pub async fn touch_or_add(&self, channel_name: &str) -> Result<bool, DbError> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO channel (channel_name, last_access)
            VALUES (?, {NOW_MS})
            ON CONFLICT (channel_name) DO UPDATE
            SET last_access = excluded.last_access
            WHERE excluded.last_access > channel.last_access
            "#
        ))
        .bind(channel_name)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a row changed. Ignoring an unknown channel inserts it
    /// with the current database time; unignoring one is a no-op.
    pub async fn set_ignore_status(
        &self,
        channel_name: &str,
        ignored: bool,
    ) -> Result<bool, DbError> {
        let result = if ignored {
            sqlx::query(&format!(
                r#"
                INSERT INTO channel (channel_name, ignored, last_access)
                VALUES (?, 1, {NOW_MS})
                ON CONFLICT (channel_name) DO UPDATE
                SET ignored = 1
                WHERE channel.ignored = 0
                "#
            ))
            .bind(channel_name)
            .execute(self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE channel
                SET ignored = 0
                WHERE channel_name = ? AND ignored <> 0
                "#,
            )
            .bind(channel_name)
            .execute(self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    /// Unknown channels are not ignored.
    pub async fn is_ignored(&self, channel_name: &str) -> Result<bool, DbError> {
        let ignored: Option<bool> =
            sqlx::query_scalar("SELECT ignored FROM channel WHERE channel_name = ?")
                .bind(channel_name)
                .fetch_optional(self.pool)
                .await?;

        Ok(ignored.unwrap_or(false))
    }

    #[cfg(test)]
    pub async fn set_last_access(&self, channel_name: &str, last_access: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO channel (channel_name, last_access)
            VALUES (?, ?)
            ON CONFLICT (channel_name) DO UPDATE SET last_access = excluded.last_access
            "#,
        )
        .bind(channel_name)
        .bind(last_access)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    const HOUR: i64 = 60 * 60 * 1000;
    const WEEK: i64 = 7 * 24 * HOUR;

    #[tokio::test]
    async fn test_touch_or_add_inserts_and_moves_forward() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.channels();

        assert!(repo.touch_or_add("forsen").await.unwrap());
        let record = repo.find("forsen").await.unwrap().unwrap();
        assert!(!record.ignored);

        // last_access never moves backwards
        let future = repo.server_timestamp().await.unwrap() + HOUR;
        repo.set_last_access("forsen", future).await.unwrap();
        assert!(!repo.touch_or_add("forsen").await.unwrap());
        assert_eq!(repo.find("forsen").await.unwrap().unwrap().last_access, future);
    }

    #[tokio::test]
    async fn test_set_ignore_status_reports_changes() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.channels();

        assert!(!repo.is_ignored("forsen").await.unwrap());
        assert!(repo.set_ignore_status("forsen", true).await.unwrap());
        assert!(!repo.set_ignore_status("forsen", true).await.unwrap());
        assert!(repo.is_ignored("forsen").await.unwrap());
        assert!(repo.set_ignore_status("forsen", false).await.unwrap());
        assert!(!repo.is_ignored("forsen").await.unwrap());
    }

    #[tokio::test]
    async fn test_unignoring_unknown_channel_adds_no_row() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.channels();

        assert!(!repo.set_ignore_status("nobody", false).await.unwrap());
        assert!(repo.find("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channels_to_join_skips_ignored_and_stagnant() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.channels();
        let now = repo.server_timestamp().await.unwrap();

        repo.set_last_access("active", now - HOUR).await.unwrap();
        repo.set_last_access("stagnant", now - 2 * WEEK).await.unwrap();
        repo.set_last_access("ignored", now - HOUR).await.unwrap();
        repo.set_ignore_status("ignored", true).await.unwrap();

        let (channels, at) = repo.channels_to_join(WEEK).await.unwrap();
        assert_eq!(channels, vec!["active".to_string()]);
        assert!(at >= now);
    }

    #[tokio::test]
    async fn test_channels_to_vacuum_includes_ignored_and_stagnant() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.channels();
        let now = repo.server_timestamp().await.unwrap();

        repo.set_last_access("active", now - HOUR).await.unwrap();
        repo.set_last_access("stagnant", now - 2 * WEEK).await.unwrap();
        repo.set_last_access("ignored", now - HOUR).await.unwrap();
        repo.set_ignore_status("ignored", true).await.unwrap();

        let channels = repo.channels_to_vacuum(WEEK).await.unwrap();
        assert_eq!(channels, vec!["ignored".to_string(), "stagnant".to_string()]);
    }

    #[tokio::test]
    async fn test_channels_to_part_reports_each_boundary_once() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.channels();
        let now = repo.server_timestamp().await.unwrap();

        // crossed the boundary an hour ago
        repo.set_last_access("recent", now - WEEK - HOUR).await.unwrap();
        // crossed it long before the previous run
        repo.set_last_access("old", now - 3 * WEEK).await.unwrap();
        repo.set_last_access("active", now - HOUR).await.unwrap();

        let since = now - 2 * HOUR;
        let (first, at) = repo.channels_to_part(since, WEEK).await.unwrap();
        assert_eq!(first, vec!["recent".to_string()]);

        let (second, next) = repo.channels_to_part(at, WEEK).await.unwrap();
        assert!(second.is_empty());
        assert!(next >= at);
    }
}
