//! Channel lifecycle: startup joins, the vacuum loop and the expiry loop.
//!
//! A channel is *active* while it is read within the expiry window, becomes
//! *stagnant* once it is not, and *ignored* when its owner opts out. The
//! vacuum loop parts stagnant and ignored channels and purges their logs.

use crate::config::VacuumStrategy;
use crate::db::{ChannelRegistry, DbError};
use crate::feed::FeedConnection;
use crate::metrics;
use crate::store::{MessageStore, StoreError};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Startup joins in flight at once. The feed paces the actual JOIN lines.
const JOIN_CONCURRENCY: usize = 32;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("registry error: {0}")]
    Registry(#[from] DbError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Source of loop ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` ends the loop.
    async fn tick(&mut self) -> bool;
}

/// Ticks on a tokio interval. The first tick completes immediately.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Outcome of one vacuum run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VacuumReport {
    /// Channels parted and purged.
    pub vacuumed: Vec<String>,
    /// Channels whose part or purge failed. The purge is attempted even when
    /// the part fails. They are retried on a later run only under the rescan
    /// strategy.
    pub failed: Vec<String>,
    /// Registry time to pass to the next run.
    pub next_since: i64,
}

pub struct ChannelLifecycle {
    registry: Arc<dyn ChannelRegistry>,
    store: Arc<dyn MessageStore>,
    feed: Arc<dyn FeedConnection>,
    strategy: VacuumStrategy,
}

impl ChannelLifecycle {
    pub fn new(
        registry: Arc<dyn ChannelRegistry>,
        store: Arc<dyn MessageStore>,
        feed: Arc<dyn FeedConnection>,
        strategy: VacuumStrategy,
    ) -> Self {
        Self {
            registry,
            store,
            feed,
            strategy,
        }
    }

    /// Join every non-ignored channel read within the expiry window.
    /// Individual join failures are logged and skipped.
    pub async fn join_initial(&self) -> Result<(), LifecycleError> {
        let (channels, _) = self.registry.channels_to_join().await?;
        info!(count = channels.len(), "Joining channels from registry");

        stream::iter(channels)
            .for_each_concurrent(JOIN_CONCURRENCY, |channel| async move {
                if let Err(e) = self.feed.join(&channel).await {
                    warn!(channel = %channel, error = %e, "Startup join failed");
                }
            })
            .await;

        Ok(())
    }

    /// Part and purge every channel due for retirement.
    ///
    /// `since` is the previous run's `next_since`. The windowed strategy
    /// only looks at boundaries crossed after it; without one (the first run
    /// after startup) every strategy rescans, so channels that went stagnant
    /// while the service was down are still retired.
    pub async fn vacuum(&self, since: Option<i64>) -> Result<VacuumReport, LifecycleError> {
        let (candidates, next_since) = match (self.strategy, since) {
            (VacuumStrategy::Windowed, Some(since)) => {
                self.registry.channels_to_part(since).await?
            }
            _ => {
                // read before the scan: a boundary crossed mid-scan lands in
                // the next window too
                let at = self.registry.server_timestamp().await?;
                (self.stale_channels().await?, at)
            }
        };

        let mut report = VacuumReport {
            next_since,
            ..VacuumReport::default()
        };

        for channel in candidates {
            if self.retire(&channel).await {
                debug!(channel = %channel, "Vacuumed channel");
                report.vacuumed.push(channel);
            } else {
                report.failed.push(channel);
            }
        }

        Ok(report)
    }

    /// Ignored or stagnant channels that are still wanted or still have a log.
    /// Channels already parted and purged need no second pass.
    async fn stale_channels(&self) -> Result<Vec<String>, LifecycleError> {
        let stale = self.registry.channels_to_vacuum().await?;
        let wanted = self.feed.wanted_channels();
        let stored = self.store.list_channels_with_messages().await?;
        Ok(stale
            .into_iter()
            .filter(|c| wanted.contains(c) || stored.contains(c))
            .collect())
    }

    /// Part `channel` and purge its log. Each step runs regardless of the
    /// other and logs its own failure. Returns whether both succeeded.
    async fn retire(&self, channel: &str) -> bool {
        let parted = match self.feed.part(channel).await {
            Ok(()) => {
                metrics::record_parted("vacuum");
                true
            }
            Err(e) => {
                metrics::record_vacuum_failure();
                warn!(channel = %channel, error = %e, "Failed to part channel");
                false
            }
        };

        let purged = match self.store.delete_messages(channel).await {
            Ok(()) => true,
            Err(e) => {
                metrics::record_vacuum_failure();
                warn!(channel = %channel, error = %e, "Failed to purge channel log");
                false
            }
        };

        parted && purged
    }

    /// Run [`vacuum`](Self::vacuum) on every tick until the ticker ends. The
    /// first run rescans.
    pub async fn run_vacuum_loop(&self, mut ticker: impl Ticker) {
        let mut since = None;
        while ticker.tick().await {
            match self.vacuum(since).await {
                Ok(report) => {
                    since = Some(report.next_since);
                    info!(
                        vacuumed = report.vacuumed.len(),
                        failed = report.failed.len(),
                        "Vacuum run finished"
                    );
                }
                Err(e) => warn!(error = %e, "Vacuum run failed"),
            }
        }
    }

    /// Drop records older than `max_age` from every stored channel. Returns
    /// the number of records removed.
    pub async fn trim_expired(&self, max_age: Duration) -> Result<usize, LifecycleError> {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now()
            .timestamp_millis()
            .saturating_sub(max_age_ms);

        let mut removed = 0;
        for channel in self.store.list_channels_with_messages().await? {
            match self.store.trim_expired_messages(&channel, cutoff).await {
                Ok(count) => removed += count,
                Err(e) => warn!(channel = %channel, error = %e, "Failed to trim expired messages"),
            }
        }

        metrics::record_expired(removed);
        Ok(removed)
    }

    /// Run [`trim_expired`](Self::trim_expired) on every tick until the
    /// ticker ends.
    pub async fn run_expiry_loop(&self, mut ticker: impl Ticker, max_age: Duration) {
        while ticker.tick().await {
            match self.trim_expired(max_age).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Trimmed expired messages"),
                Err(e) => warn!(error = %e, "Expiry run failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteRegistry};
    use crate::feed::fake::FakeFeed;
    use crate::store::StoredRecord;
    use crate::store::memory::MemoryStore;
    use tokio::sync::mpsc;

    const HOUR: i64 = 60 * 60 * 1000;
    const WEEK: i64 = 7 * 24 * HOUR;

    /// Ticks once per message; ends when the sender is dropped.
    pub struct ChannelTicker(pub mpsc::UnboundedReceiver<()>);

    #[async_trait]
    impl Ticker for ChannelTicker {
        async fn tick(&mut self) -> bool {
            self.0.recv().await.is_some()
        }
    }

    struct Fixture {
        db: Database,
        store: Arc<MemoryStore>,
        feed: Arc<FakeFeed>,
        lifecycle: ChannelLifecycle,
    }

    async fn fixture(strategy: VacuumStrategy, joined: &[&str]) -> Fixture {
        let db = Database::new(":memory:").await.unwrap();
        let registry = Arc::new(SqliteRegistry::new(
            db.clone(),
            Duration::from_millis(WEEK as u64),
        ));
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let feed = Arc::new(FakeFeed::with_joined(joined));
        let lifecycle = ChannelLifecycle::new(registry, store.clone(), feed.clone(), strategy);
        Fixture {
            db,
            store,
            feed,
            lifecycle,
        }
    }

    #[tokio::test]
    async fn test_join_initial_joins_active_channels() {
        let f = fixture(VacuumStrategy::Rescan, &[]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("forsen", now - HOUR).await.unwrap();
        repo.set_last_access("pajlada", now - HOUR).await.unwrap();
        repo.set_last_access("stale", now - 2 * WEEK).await.unwrap();
        repo.set_last_access("optout", now - HOUR).await.unwrap();
        repo.set_ignore_status("optout", true).await.unwrap();
        f.feed.refuse.lock().insert("pajlada".to_string());

        f.lifecycle.join_initial().await.unwrap();

        let mut calls = f.feed.join_calls.lock().clone();
        calls.sort();
        assert_eq!(calls, vec!["forsen".to_string(), "pajlada".to_string()]);
        assert!(f.feed.joined_channels().contains("forsen"));
        assert!(!f.feed.joined_channels().contains("pajlada"));
    }

    #[tokio::test]
    async fn test_rescan_vacuums_once() {
        let f = fixture(VacuumStrategy::Rescan, &["stale", "active", "optout"]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("stale", now - 2 * WEEK).await.unwrap();
        repo.set_last_access("active", now - HOUR).await.unwrap();
        repo.set_last_access("optout", now - HOUR).await.unwrap();
        repo.set_ignore_status("optout", true).await.unwrap();
        f.store.append("stale", "@id=1 :a!a@a PRIVMSG #stale :hi").await.unwrap();
        f.store.append("active", "@id=2 :a!a@a PRIVMSG #active :hi").await.unwrap();

        let first = f.lifecycle.vacuum(None).await.unwrap();
        assert_eq!(first.vacuumed, vec!["optout".to_string(), "stale".to_string()]);
        assert!(first.failed.is_empty());
        assert!(f.store.get_messages("stale").await.unwrap().is_empty());
        assert_eq!(f.store.get_messages("active").await.unwrap().len(), 1);
        assert_eq!(
            f.feed.wanted_channels().into_iter().collect::<Vec<_>>(),
            vec!["active".to_string()]
        );

        let second = f.lifecycle.vacuum(Some(first.next_since)).await.unwrap();
        assert!(second.vacuumed.is_empty());
        assert_eq!(f.feed.part_calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_windowed_vacuums_once() {
        let f = fixture(VacuumStrategy::Windowed, &["stale", "active"]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("stale", now - WEEK - HOUR).await.unwrap();
        repo.set_last_access("active", now - HOUR).await.unwrap();
        f.store.append("stale", "@id=1 :a!a@a PRIVMSG #stale :hi").await.unwrap();

        let first = f.lifecycle.vacuum(Some(now - 2 * HOUR)).await.unwrap();
        assert_eq!(first.vacuumed, vec!["stale".to_string()]);
        assert!(first.next_since >= now);
        assert!(f.store.get_messages("stale").await.unwrap().is_empty());

        let second = f.lifecycle.vacuum(Some(first.next_since)).await.unwrap();
        assert!(second.vacuumed.is_empty());
        assert_eq!(f.feed.part_calls.lock().clone(), vec!["stale".to_string()]);
    }

    #[tokio::test]
    async fn test_vacuum_isolates_channel_failures() {
        let f = fixture(VacuumStrategy::Rescan, &["broken", "stale"]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("broken", now - 2 * WEEK).await.unwrap();
        repo.set_last_access("stale", now - 2 * WEEK).await.unwrap();
        f.feed.fail_part.lock().insert("broken".to_string());
        f.store.append("broken", "@id=1 :a!a@a PRIVMSG #broken :hi").await.unwrap();

        let report = f.lifecycle.vacuum(None).await.unwrap();
        assert_eq!(report.vacuumed, vec!["stale".to_string()]);
        assert_eq!(report.failed, vec!["broken".to_string()]);
        // the log is purged even though the part failed
        assert!(f.store.get_messages("broken").await.unwrap().is_empty());

        // still wanted, so the next rescan retries the part
        f.feed.fail_part.lock().clear();
        let retry = f.lifecycle.vacuum(Some(report.next_since)).await.unwrap();
        assert_eq!(retry.vacuumed, vec!["broken".to_string()]);
        assert!(f.feed.wanted_channels().is_empty());
    }

    #[tokio::test]
    async fn test_windowed_purges_log_when_part_fails() {
        let f = fixture(VacuumStrategy::Windowed, &["stale"]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("stale", now - WEEK - HOUR).await.unwrap();
        f.store.append("stale", "@id=1 :a!a@a PRIVMSG #stale :hi").await.unwrap();
        f.feed.fail_part.lock().insert("stale".to_string());

        let first = f.lifecycle.vacuum(Some(now - 2 * HOUR)).await.unwrap();
        assert_eq!(first.failed, vec!["stale".to_string()]);
        assert!(f.store.get_messages("stale").await.unwrap().is_empty());

        f.feed.fail_part.lock().clear();
        let second = f.lifecycle.vacuum(Some(first.next_since)).await.unwrap();
        assert!(second.vacuumed.is_empty());
        assert!(f.store.list_channels_with_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_windowed_first_run_retires_channels_stale_before_startup() {
        let f = fixture(VacuumStrategy::Windowed, &[]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        // went stagnant while the service was down
        repo.set_last_access("stale", now - WEEK - HOUR).await.unwrap();
        repo.set_last_access("active", now - HOUR).await.unwrap();
        f.store.append("stale", "@id=1 :a!a@a PRIVMSG #stale :hi").await.unwrap();

        f.lifecycle.join_initial().await.unwrap();
        assert_eq!(f.feed.join_calls.lock().clone(), vec!["active".to_string()]);

        let first = f.lifecycle.vacuum(None).await.unwrap();
        assert_eq!(first.vacuumed, vec!["stale".to_string()]);
        assert!(first.next_since >= now);
        assert!(f.store.get_messages("stale").await.unwrap().is_empty());

        // later runs are windowed again
        let second = f.lifecycle.vacuum(Some(first.next_since)).await.unwrap();
        assert!(second.vacuumed.is_empty());
        assert_eq!(
            f.feed.wanted_channels().into_iter().collect::<Vec<_>>(),
            vec!["active".to_string()]
        );
    }

    #[tokio::test]
    async fn test_windowed_loop_rescans_first() {
        let f = fixture(VacuumStrategy::Windowed, &[]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("stale", now - 3 * WEEK).await.unwrap();
        f.store.append("stale", "@id=1 :a!a@a PRIVMSG #stale :hi").await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        drop(tx);

        f.lifecycle.run_vacuum_loop(ChannelTicker(rx)).await;
        assert_eq!(f.feed.part_calls.lock().clone(), vec!["stale".to_string()]);
        assert!(f.store.list_channels_with_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vacuum_loop_runs_per_tick() {
        let f = fixture(VacuumStrategy::Rescan, &["stale"]).await;
        let repo = f.db.channels();
        let now = repo.server_timestamp().await.unwrap();
        repo.set_last_access("stale", now - 2 * WEEK).await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        drop(tx);

        f.lifecycle.run_vacuum_loop(ChannelTicker(rx)).await;
        assert_eq!(f.feed.part_calls.lock().clone(), vec!["stale".to_string()]);
    }

    #[tokio::test]
    async fn test_trim_expired_drops_old_records() {
        let f = fixture(VacuumStrategy::Rescan, &[]).await;
        let now = chrono::Utc::now().timestamp_millis();
        let old = StoredRecord {
            create_time: now - 2 * HOUR,
            message: "old".to_string(),
        };
        let fresh = StoredRecord {
            create_time: now,
            message: "fresh".to_string(),
        };
        f.store.append_record("forsen", old.clone()).await.unwrap();
        f.store.append_record("forsen", fresh.clone()).await.unwrap();
        f.store.append_record("pajlada", old).await.unwrap();

        let removed = f
            .lifecycle
            .trim_expired(Duration::from_secs(60 * 60))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(f.store.get_messages("forsen").await.unwrap(), vec![fresh]);
        assert!(f.store.get_messages("pajlada").await.unwrap().is_empty());
    }
}
