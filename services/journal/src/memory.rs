//! In-process journal
//!
//! Backing store for tests and embedded use. Supports injecting a single
//! append failure to exercise the persistence-failure path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use async_trait::async_trait;

use crate::store::{EventJournal, JournalError, SequencedRecord};

/// In-memory journal keyed by persistence id.
#[derive(Default)]
pub struct MemoryJournal {
    streams: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    fail_next: AtomicBool,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `append` fail with a backend error.
    pub fn fail_next_append(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventJournal for MemoryJournal {
    async fn append(&self, persistence_id: &str, payload: &[u8]) -> Result<u64, JournalError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(JournalError::Failed("injected append failure".into()));
        }
        let mut streams = self.streams.lock().await;
        let stream = streams.entry(persistence_id.to_string()).or_default();
        stream.push(payload.to_vec());
        Ok(stream.len() as u64)
    }

    async fn read_all(&self, persistence_id: &str) -> Result<Vec<SequencedRecord>, JournalError> {
        let streams = self.streams.lock().await;
        Ok(streams
            .get(persistence_id)
            .map(|stream| {
                stream
                    .iter()
                    .enumerate()
                    .map(|(i, payload)| SequencedRecord::new(i as u64 + 1, payload.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn highest_sequence(&self, persistence_id: &str) -> Result<u64, JournalError> {
        let streams = self.streams.lock().await;
        Ok(streams
            .get(persistence_id)
            .map(|stream| stream.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read() {
        let journal = MemoryJournal::new();
        assert_eq!(journal.append("zone-a", b"one").await.unwrap(), 1);
        assert_eq!(journal.append("zone-a", b"two").await.unwrap(), 2);

        let records = journal.read_all("zone-a").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].payload, b"two");
        assert_eq!(journal.highest_sequence("zone-a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let journal = MemoryJournal::new();
        journal.append("zone-a", b"a").await.unwrap();
        assert_eq!(journal.append("zone-b", b"b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let journal = MemoryJournal::new();
        journal.fail_next_append();
        assert!(journal.append("zone-a", b"x").await.is_err());
        assert_eq!(journal.append("zone-a", b"x").await.unwrap(), 1);
    }
}
