//! Journal interface, records, and errors

use async_trait::async_trait;
use crc32c::crc32c;
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record encoding error: {0}")]
    Encoding(String),

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("Checksum mismatch at sequence {sequence}")]
    ChecksumMismatch { sequence: u64 },

    #[error("Journal backend failure: {0}")]
    Failed(String),
}

// ── Sequenced Record ────────────────────────────────────────────────

/// One persisted record: an opaque payload under a store-assigned sequence.
///
/// # Binary Format (per record)
/// ```text
/// [body_len: u32]
/// [sequence: u64]
/// [payload_len: u32][payload: bytes]
/// [checksum: u32]  // CRC32C over sequence+payload
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedRecord {
    pub sequence: u64,
    pub payload: Vec<u8>,
}

impl SequencedRecord {
    pub fn new(sequence: u64, payload: Vec<u8>) -> Self {
        Self { sequence, payload }
    }

    /// CRC32C over the concatenation of (sequence, payload).
    pub fn checksum(sequence: u64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(8 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    /// Serialize to the binary record format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        // body = 8 (seq) + 4 (payload_len) + payload + 4 (crc)
        let body_len: u32 = 8 + 4 + payload_len + 4;
        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&Self::checksum(self.sequence, &self.payload).to_le_bytes());
        buf
    }

    /// Deserialize one record, returning `(record, bytes_consumed)`.
    ///
    /// A parse failure here means a truncated or implausible record (the
    /// normal shape of a crash-interrupted tail); a checksum failure on a
    /// fully-parsed record is reported separately by the caller.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize, u32), JournalError> {
        if data.len() < 4 {
            return Err(JournalError::Encoding(
                "not enough data for length prefix".into(),
            ));
        }
        let body_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if body_len > 100_000_000 {
            return Err(JournalError::Encoding(format!(
                "implausible body length: {}",
                body_len
            )));
        }
        // Minimum body: 8 (seq) + 4 (payload_len) + 0 + 4 (crc)
        if body_len < 16 {
            return Err(JournalError::Encoding(format!(
                "body too small: {} bytes",
                body_len
            )));
        }
        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Encoding(format!(
                "incomplete record: need {} bytes, have {}",
                total,
                data.len()
            )));
        }
        let body = &data[4..total];
        let sequence = u64::from_le_bytes(body[0..8].try_into().unwrap());
        let payload_len = u32::from_le_bytes(body[8..12].try_into().unwrap()) as usize;
        if 12 + payload_len + 4 != body.len() {
            return Err(JournalError::Encoding(format!(
                "payload length {} inconsistent with body length {}",
                payload_len,
                body.len()
            )));
        }
        let payload = body[12..12 + payload_len].to_vec();
        let stored_checksum =
            u32::from_le_bytes(body[12 + payload_len..].try_into().unwrap());
        Ok((Self { sequence, payload }, total, stored_checksum))
    }

    /// Validate a stored checksum against the recomputed value.
    pub fn verify(&self, stored_checksum: u32) -> bool {
        Self::checksum(self.sequence, &self.payload) == stored_checksum
    }
}

// ── Journal Interface ───────────────────────────────────────────────

/// The persistence backend seam.
///
/// Implementations must assign gapless sequence numbers per persistence id,
/// starting at 1, and must make `append` durable before returning.
#[async_trait]
pub trait EventJournal: Send + Sync {
    /// Append a payload, returning its assigned sequence number.
    async fn append(&self, persistence_id: &str, payload: &[u8]) -> Result<u64, JournalError>;

    /// Read every record for a persistence id, in sequence order.
    async fn read_all(&self, persistence_id: &str) -> Result<Vec<SequencedRecord>, JournalError>;

    /// The highest assigned sequence number (0 if none).
    async fn highest_sequence(&self, persistence_id: &str) -> Result<u64, JournalError>;
}
