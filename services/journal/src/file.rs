//! File-backed journal
//!
//! One append-only file per persistence id. Records carry CRC32C checksums;
//! a crash-truncated tail is detected on open and cut back to the last whole
//! record before new writes land. A checksum mismatch on a whole record is a
//! hard error: silent loss of interior records must not happen.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use async_trait::async_trait;

use crate::store::{EventJournal, JournalError, SequencedRecord};

struct Writer {
    file: File,
    next_sequence: u64,
}

/// Append-only file journal rooted at a directory.
pub struct FileJournal {
    dir: PathBuf,
    writers: Mutex<HashMap<String, Writer>>,
}

/// Result of scanning a journal file: the valid records, the byte length of
/// the valid prefix, and whether a damaged tail was found.
struct Scan {
    records: Vec<SequencedRecord>,
    valid_len: u64,
    damaged_tail: bool,
}

impl FileJournal {
    /// Open a journal rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: Mutex::new(HashMap::new()),
        })
    }

    fn path_for(&self, persistence_id: &str) -> PathBuf {
        self.dir.join(format!("{}.journal", persistence_id))
    }

    fn scan(path: &Path) -> Result<Scan, JournalError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Scan {
                    records: Vec::new(),
                    valid_len: 0,
                    damaged_tail: false,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut pos = 0usize;
        let mut damaged_tail = false;
        while pos < data.len() {
            match SequencedRecord::from_bytes(&data[pos..]) {
                Ok((record, consumed, stored_checksum)) => {
                    if !record.verify(stored_checksum) {
                        return Err(JournalError::ChecksumMismatch {
                            sequence: record.sequence,
                        });
                    }
                    let expected = records
                        .last()
                        .map(|r: &SequencedRecord| r.sequence + 1)
                        .unwrap_or(1);
                    if record.sequence != expected {
                        return Err(JournalError::SequenceGap {
                            expected,
                            got: record.sequence,
                        });
                    }
                    records.push(record);
                    pos += consumed;
                }
                Err(_) => {
                    warn!(
                        path = %path.display(),
                        offset = pos,
                        trailing = data.len() - pos,
                        "damaged journal tail, recovering valid prefix"
                    );
                    damaged_tail = true;
                    break;
                }
            }
        }
        Ok(Scan {
            records,
            valid_len: pos as u64,
            damaged_tail,
        })
    }

    fn open_writer(&self, persistence_id: &str) -> Result<Writer, JournalError> {
        let path = self.path_for(persistence_id);
        let scan = Self::scan(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if scan.damaged_tail {
            file.set_len(scan.valid_len)?;
            info!(
                persistence_id,
                valid_records = scan.records.len(),
                "truncated damaged journal tail"
            );
        }
        Ok(Writer {
            file,
            next_sequence: scan.records.last().map(|r| r.sequence + 1).unwrap_or(1),
        })
    }
}

#[async_trait]
impl EventJournal for FileJournal {
    async fn append(&self, persistence_id: &str, payload: &[u8]) -> Result<u64, JournalError> {
        let mut writers = self.writers.lock().await;
        if !writers.contains_key(persistence_id) {
            let writer = self.open_writer(persistence_id)?;
            writers.insert(persistence_id.to_string(), writer);
        }
        let writer = writers.get_mut(persistence_id).expect("writer just inserted");

        let sequence = writer.next_sequence;
        let record = SequencedRecord::new(sequence, payload.to_vec());
        writer.file.write_all(&record.to_bytes())?;
        writer.file.sync_all()?;
        writer.next_sequence = sequence + 1;
        Ok(sequence)
    }

    async fn read_all(&self, persistence_id: &str) -> Result<Vec<SequencedRecord>, JournalError> {
        let scan = Self::scan(&self.path_for(persistence_id))?;
        Ok(scan.records)
    }

    async fn highest_sequence(&self, persistence_id: &str) -> Result<u64, JournalError> {
        let writers = self.writers.lock().await;
        if let Some(writer) = writers.get(persistence_id) {
            return Ok(writer.next_sequence - 1);
        }
        drop(writers);
        let scan = Self::scan(&self.path_for(persistence_id))?;
        Ok(scan.records.last().map(|r| r.sequence).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_assigns_sequences_from_one() {
        let tmp = TempDir::new().unwrap();
        let journal = FileJournal::open(tmp.path()).unwrap();

        assert_eq!(journal.append("zone-a", b"first").await.unwrap(), 1);
        assert_eq!(journal.append("zone-a", b"second").await.unwrap(), 2);
        assert_eq!(journal.append("zone-b", b"other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_all_returns_records_in_order() {
        let tmp = TempDir::new().unwrap();
        let journal = FileJournal::open(tmp.path()).unwrap();
        for i in 0..10u8 {
            journal.append("zone-a", &[i]).await.unwrap();
        }

        let records = journal.read_all("zone-a").await.unwrap();
        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.sequence, i as u64 + 1);
            assert_eq!(record.payload, vec![i as u8]);
        }
    }

    #[tokio::test]
    async fn test_read_missing_id_is_empty() {
        let tmp = TempDir::new().unwrap();
        let journal = FileJournal::open(tmp.path()).unwrap();
        assert!(journal.read_all("zone-missing").await.unwrap().is_empty());
        assert_eq!(journal.highest_sequence("zone-missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sequences_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let journal = FileJournal::open(tmp.path()).unwrap();
            journal.append("zone-a", b"one").await.unwrap();
            journal.append("zone-a", b"two").await.unwrap();
        }
        let journal = FileJournal::open(tmp.path()).unwrap();
        assert_eq!(journal.highest_sequence("zone-a").await.unwrap(), 2);
        assert_eq!(journal.append("zone-a", b"three").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_damaged_tail_is_recovered() {
        let tmp = TempDir::new().unwrap();
        let path;
        {
            let journal = FileJournal::open(tmp.path()).unwrap();
            journal.append("zone-a", b"kept").await.unwrap();
            path = journal.path_for("zone-a");
        }
        // Simulate a crash mid-write: half a record at the tail.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x20, 0x00, 0x00, 0x00, 0x01, 0x02]).unwrap();
        drop(file);

        let journal = FileJournal::open(tmp.path()).unwrap();
        let records = journal.read_all("zone-a").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, b"kept");

        // Appending truncates the damage and continues the sequence.
        assert_eq!(journal.append("zone-a", b"next").await.unwrap(), 2);
        let records = journal.read_all("zone-a").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_interior_corruption_is_a_hard_error() {
        let tmp = TempDir::new().unwrap();
        let path;
        {
            let journal = FileJournal::open(tmp.path()).unwrap();
            journal.append("zone-a", b"aaaa").await.unwrap();
            journal.append("zone-a", b"bbbb").await.unwrap();
            path = journal.path_for("zone-a");
        }
        // Flip a payload byte inside the first record.
        let mut data = fs::read(&path).unwrap();
        data[4 + 8 + 4] ^= 0xff;
        fs::write(&path, &data).unwrap();

        let journal = FileJournal::open(tmp.path()).unwrap();
        let result = journal.read_all("zone-a").await;
        assert!(matches!(
            result,
            Err(JournalError::ChecksumMismatch { sequence: 1 })
        ));
    }
}
