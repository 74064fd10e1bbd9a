//! Message log store abstraction.
//!
//! A bounded, per-channel append log of raw protocol lines. Every backend
//! keeps at most `buffer_size` records per channel, evicting the oldest in
//! the same write as the insert, and hands records back oldest first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub mod memory;
pub mod redb;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] ::redb::DatabaseError),
    #[error("transaction error: {0}")]
    Transaction(#[from] ::redb::TransactionError),
    #[error("table error: {0}")]
    Table(#[from] ::redb::TableError),
    #[error("storage error: {0}")]
    Storage(#[from] ::redb::StorageError),
    #[error("commit error: {0}")]
    Commit(#[from] ::redb::CommitError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("buffer size must be at least 1")]
    ZeroBufferSize,
}

/// One retained protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// Milliseconds since the Unix epoch, assigned when the line was appended.
    pub create_time: i64,
    /// Raw wire line as received, unaltered.
    pub message: String,
}

impl StoredRecord {
    /// Wrap `message` with the current wall-clock time.
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            create_time: chrono::Utc::now().timestamp_millis(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert `record` as the newest entry and evict down to the buffer size,
    /// atomically.
    async fn append_record(&self, channel: &str, record: StoredRecord) -> Result<(), StoreError>;

    /// All retained records for `channel`, oldest first. Unknown channels
    /// yield an empty list.
    async fn get_messages(&self, channel: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Drop the whole log of `channel`.
    async fn delete_messages(&self, channel: &str) -> Result<(), StoreError>;

    /// Channels holding at least one record.
    async fn list_channels_with_messages(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Remove every record up to (not including) the first one created after
    /// `cutoff_ms`. Returns the number removed.
    async fn trim_expired_messages(&self, channel: &str, cutoff_ms: i64)
    -> Result<usize, StoreError>;

    /// Append a raw line stamped with the current time.
    async fn append(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        self.append_record(channel, StoredRecord::now(message)).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Behaviour shared by every backend, run against each in its own tests.

    use super::*;

    pub fn record(create_time: i64, message: &str) -> StoredRecord {
        StoredRecord {
            create_time,
            message: message.to_string(),
        }
    }

    pub async fn buffer_keeps_newest(store: &dyn MessageStore, buffer_size: usize) {
        for i in 0..=buffer_size {
            store
                .append_record("forsen", record(i as i64, &format!("line {i}")))
                .await
                .unwrap();
        }

        let messages = store.get_messages("forsen").await.unwrap();
        assert_eq!(messages.len(), buffer_size);
        assert_eq!(messages[0].message, "line 1");
        assert_eq!(messages[buffer_size - 1].message, format!("line {buffer_size}"));
        assert!(messages.iter().all(|m| m.message != "line 0"));
        assert!(
            messages
                .windows(2)
                .all(|w| w[0].create_time < w[1].create_time)
        );
    }

    pub async fn unknown_channel_is_empty(store: &dyn MessageStore) {
        assert!(store.get_messages("nobody").await.unwrap().is_empty());
        assert_eq!(store.trim_expired_messages("nobody", i64::MAX).await.unwrap(), 0);
        store.delete_messages("nobody").await.unwrap();
    }

    pub async fn channels_are_isolated(store: &dyn MessageStore) {
        store.append_record("a", record(1, "a1")).await.unwrap();
        store.append_record("ab", record(2, "ab1")).await.unwrap();
        store.append_record("b", record(3, "b1")).await.unwrap();

        let channels = store.list_channels_with_messages().await.unwrap();
        assert_eq!(
            channels.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "ab".to_string(), "b".to_string()]
        );

        store.delete_messages("a").await.unwrap();
        assert!(store.get_messages("a").await.unwrap().is_empty());
        assert_eq!(store.get_messages("ab").await.unwrap().len(), 1);

        let channels = store.list_channels_with_messages().await.unwrap();
        assert!(!channels.contains("a"));
        assert!(channels.contains("ab"));
    }

    pub async fn trim_expired(store: &dyn MessageStore) {
        for i in 0..10 {
            store
                .append_record("forsen", record(100 + i, &format!("m{i}")))
                .await
                .unwrap();
        }

        // cutoff before every record: nothing trimmed
        assert_eq!(store.trim_expired_messages("forsen", 50).await.unwrap(), 0);
        assert_eq!(store.get_messages("forsen").await.unwrap().len(), 10);

        // records with create_time <= cutoff go, the rest stay in order
        assert_eq!(store.trim_expired_messages("forsen", 103).await.unwrap(), 4);
        let left = store.get_messages("forsen").await.unwrap();
        assert_eq!(left.len(), 6);
        assert_eq!(left[0].message, "m4");

        // cutoff after every record empties the log
        assert_eq!(store.trim_expired_messages("forsen", 1_000).await.unwrap(), 6);
        assert!(store.get_messages("forsen").await.unwrap().is_empty());
        assert!(
            !store
                .list_channels_with_messages()
                .await
                .unwrap()
                .contains("forsen")
        );
    }

    pub async fn append_after_delete(store: &dyn MessageStore) {
        store.append_record("forsen", record(1, "old")).await.unwrap();
        store.delete_messages("forsen").await.unwrap();
        store.append_record("forsen", record(2, "new")).await.unwrap();

        let messages = store.get_messages("forsen").await.unwrap();
        assert_eq!(messages, vec![record(2, "new")]);
    }
}
