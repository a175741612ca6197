//! In-memory listen log, bounded to the most recent entries.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ListenLogEntry, ListenLogStorage, StorageError};

#[derive(Debug)]
pub struct MemoryListenLog {
    entries: Mutex<VecDeque<ListenLogEntry>>,
    capacity: usize,
}

impl MemoryListenLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl ListenLogStorage for MemoryListenLog {
    async fn append(&self, entry: ListenLogEntry) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("listen log lock poisoned".into()))?;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ListenLogEntry>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("listen log lock poisoned".into()))?;
        Ok(entries.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_most_recent_entries() {
        let log = MemoryListenLog::new(2);
        for listeners in [1, 2, 3] {
            log.append(ListenLogEntry::now(listeners)).await.unwrap();
        }

        let listeners: Vec<_> = log
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.listeners)
            .collect();
        assert_eq!(listeners, vec![2, 3]);
    }
}
