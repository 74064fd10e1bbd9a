//! In-process message log, used when no persistence is configured and in tests.

use super::{MessageStore, StoreError, StoredRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};

pub struct MemoryStore {
    logs: Mutex<HashMap<String, VecDeque<StoredRecord>>>,
    buffer_size: usize,
}

impl MemoryStore {
    pub fn new(buffer_size: usize) -> Result<Self, StoreError> {
        if buffer_size == 0 {
            return Err(StoreError::ZeroBufferSize);
        }
        Ok(Self {
            logs: Mutex::new(HashMap::new()),
            buffer_size,
        })
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_record(&self, channel: &str, record: StoredRecord) -> Result<(), StoreError> {
        let mut logs = self.logs.lock();
        let log = logs.entry(channel.to_string()).or_default();
        log.push_back(record);
        while log.len() > self.buffer_size {
            log.pop_front();
        }
        Ok(())
    }

    async fn get_messages(&self, channel: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let logs = self.logs.lock();
        Ok(logs
            .get(channel)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_messages(&self, channel: &str) -> Result<(), StoreError> {
        self.logs.lock().remove(channel);
        Ok(())
    }

    async fn list_channels_with_messages(&self) -> Result<BTreeSet<String>, StoreError> {
        let logs = self.logs.lock();
        Ok(logs
            .iter()
            .filter(|(_, log)| !log.is_empty())
            .map(|(channel, _)| channel.clone())
            .collect())
    }

    async fn trim_expired_messages(
        &self,
        channel: &str,
        cutoff_ms: i64,
    ) -> Result<usize, StoreError> {
        let mut logs = self.logs.lock();
        let Some(log) = logs.get_mut(channel) else {
            return Ok(0);
        };

        let mut removed = 0;
        while log.front().is_some_and(|r| r.create_time <= cutoff_ms) {
            log.pop_front();
            removed += 1;
        }
        if log.is_empty() {
            logs.remove(channel);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;

    #[tokio::test]
    async fn test_buffer_keeps_newest() {
        let store = MemoryStore::new(500).unwrap();
        test_support::buffer_keeps_newest(&store, 500).await;
    }

    #[tokio::test]
    async fn test_unknown_channel_is_empty() {
        let store = MemoryStore::new(10).unwrap();
        test_support::unknown_channel_is_empty(&store).await;
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let store = MemoryStore::new(10).unwrap();
        test_support::channels_are_isolated(&store).await;
    }

    #[tokio::test]
    async fn test_trim_expired() {
        let store = MemoryStore::new(10).unwrap();
        test_support::trim_expired(&store).await;
    }

    #[tokio::test]
    async fn test_append_after_delete() {
        let store = MemoryStore::new(10).unwrap();
        test_support::append_after_delete(&store).await;
    }

    #[test]
    fn test_zero_buffer_rejected() {
        assert!(matches!(
            MemoryStore::new(0),
            Err(StoreError::ZeroBufferSize)
        ));
    }
}
