//! Redb-backed message log.
//!
//! # Schema
//!
//! ```text
//! messages:         "channel\0{seq:020}" -> StoredRecord (serde_json)
//! message_sequence: "channel"             -> next sequence number
//! ```
//!
//! Keys sort by channel, then by insertion sequence, so a range scan over one
//! channel walks its log oldest first. Sequence numbers rather than
//! timestamps order the log, which keeps lines received within the same
//! millisecond distinct and in feed order.

use super::{MessageStore, StoreError, StoredRecord};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const MESSAGES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("messages");
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("message_sequence");

pub struct RedbStore {
    db: Arc<Database>,
    buffer_size: u64,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())?;
        Self::new(Arc::new(db), buffer_size)
    }

    pub fn new(db: Arc<Database>, buffer_size: usize) -> Result<Self, StoreError> {
        if buffer_size == 0 {
            return Err(StoreError::ZeroBufferSize);
        }

        // Ensure tables exist so readers never hit a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(MESSAGES_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
        }
        write_txn.commit()?;

        info!(buffer_size, "Redb message store initialized");
        Ok(Self {
            db,
            buffer_size: buffer_size as u64,
        })
    }

    fn make_key(channel: &str, seq: u64) -> String {
        format!("{}\0{:020}", channel, seq)
    }

    /// Key bounds covering every record of `channel`.
    fn channel_bounds(channel: &str) -> (String, String) {
        (format!("{}\0", channel), format!("{}\u{1}", channel))
    }
}

#[async_trait]
impl MessageStore for RedbStore {
    async fn append_record(&self, channel: &str, record: StoredRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(&record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut sequences = write_txn.open_table(SEQUENCE_TABLE)?;
            let seq = sequences.get(channel)?.map(|v| v.value()).unwrap_or(0);
            sequences.insert(channel, seq + 1)?;

            let mut table = write_txn.open_table(MESSAGES_TABLE)?;
            table.insert(Self::make_key(channel, seq).as_str(), value.as_slice())?;

            // Evict everything older than the newest `buffer_size` entries
            if seq + 1 > self.buffer_size {
                let (start, _) = Self::channel_bounds(channel);
                let first_kept = Self::make_key(channel, seq + 1 - self.buffer_size);
                let evicted = table
                    .range(start.as_str()..first_kept.as_str())?
                    .map(|item| item.map(|(k, _)| k.value().to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                for key in evicted {
                    table.remove(key.as_str())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn get_messages(&self, channel: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGES_TABLE)?;

        let (start, end) = Self::channel_bounds(channel);
        let mut messages = Vec::new();
        for item in table.range(start.as_str()..end.as_str())? {
            let (_k, v) = item?;
            messages.push(serde_json::from_slice(v.value())?);
        }
        Ok(messages)
    }

    async fn delete_messages(&self, channel: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MESSAGES_TABLE)?;
            let (start, end) = Self::channel_bounds(channel);
            let keys = table
                .range(start.as_str()..end.as_str())?
                .map(|item| item.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in keys {
                table.remove(key.as_str())?;
            }

            let mut sequences = write_txn.open_table(SEQUENCE_TABLE)?;
            sequences.remove(channel)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn list_channels_with_messages(&self) -> Result<BTreeSet<String>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGES_TABLE)?;

        let mut channels = BTreeSet::new();
        let mut cursor = String::new();

        // Hop from channel to channel instead of walking every record
        loop {
            let next_channel = match table.range(cursor.as_str()..)?.next() {
                Some(item) => {
                    let (k, _) = item?;
                    match k.value().split_once('\0') {
                        Some((channel, _)) => channel.to_string(),
                        None => break,
                    }
                }
                None => break,
            };

            cursor = Self::channel_bounds(&next_channel).1;
            channels.insert(next_channel);
        }

        Ok(channels)
    }

    async fn trim_expired_messages(
        &self,
        channel: &str,
        cutoff_ms: i64,
    ) -> Result<usize, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(MESSAGES_TABLE)?;
            let (start, end) = Self::channel_bounds(channel);

            let mut expired = Vec::new();
            for item in table.range(start.as_str()..end.as_str())? {
                let (k, v) = item?;
                let record: StoredRecord = serde_json::from_slice(v.value())?;
                // age-ordered: the first live record ends the scan
                if record.create_time > cutoff_ms {
                    break;
                }
                expired.push(k.value().to_string());
            }

            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;
    use tempfile::tempdir;

    fn create_store(buffer_size: usize) -> (RedbStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("messages.redb"), buffer_size).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_buffer_keeps_newest() {
        let (store, _dir) = create_store(500);
        test_support::buffer_keeps_newest(&store, 500).await;
    }

    #[tokio::test]
    async fn test_buffer_of_one() {
        let (store, _dir) = create_store(1);
        test_support::buffer_keeps_newest(&store, 1).await;
    }

    #[tokio::test]
    async fn test_unknown_channel_is_empty() {
        let (store, _dir) = create_store(10);
        test_support::unknown_channel_is_empty(&store).await;
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let (store, _dir) = create_store(10);
        test_support::channels_are_isolated(&store).await;
    }

    #[tokio::test]
    async fn test_trim_expired() {
        let (store, _dir) = create_store(10);
        test_support::trim_expired(&store).await;
    }

    #[tokio::test]
    async fn test_append_after_delete() {
        let (store, _dir) = create_store(10);
        test_support::append_after_delete(&store).await;
    }

    #[tokio::test]
    async fn test_same_millisecond_keeps_feed_order() {
        let (store, _dir) = create_store(10);
        for msg in ["first", "second", "third"] {
            store
                .append_record("forsen", test_support::record(42, msg))
                .await
                .unwrap();
        }
        let messages: Vec<_> = store
            .get_messages("forsen")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_messages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.redb");
        {
            let store = RedbStore::open(&path, 10).unwrap();
            store.append("forsen", "PING").await.unwrap();
        }
        let store = RedbStore::open(&path, 10).unwrap();
        let messages = store.get_messages("forsen").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message, "PING");
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            RedbStore::open(dir.path().join("m.redb"), 0),
            Err(StoreError::ZeroBufferSize)
        ));
    }
}
