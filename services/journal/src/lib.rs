//! Append-only event journal
//!
//! Each zone's events are stored under its persistence id
//! (`"zone-" + zone_id`) with store-assigned, gapless sequence numbers
//! starting at 1. The journal is the only durability boundary: validator
//! state is reconstructed by replaying a zone's records in sequence order.
//!
//! # Modules
//! - `store`: The `EventJournal` interface, records, and errors
//! - `file`: File-backed journal with CRC32C framing and tail recovery
//! - `memory`: In-process journal for tests and embedded use

pub mod store;
pub mod file;
pub mod memory;

pub use file::FileJournal;
pub use memory::MemoryJournal;
pub use store::{EventJournal, JournalError, SequencedRecord};
