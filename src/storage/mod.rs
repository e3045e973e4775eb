//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist flushed memtables to disk in sorted format
//! - Point lookups and prefix scans across all tables
//! - Full compaction once too many tables accumulate
//!
//! ## File Format (V1 - Simple)
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header                                 │
//! │ ┌──────────┬──────────┬──────────────┐ │
//! │ │Magic (4) │Version(2)│ Entry Count  │ │
//! │ └──────────┴──────────┴──────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Data Block                             │
//! │ ┌────────┬────────┬─────┬───────────┐ │
//! │ │KeyLen  │ValLen  │ Key │   Value   │ │
//! │ └────────┴────────┴─────┴───────────┘ │
//! │ ... (repeated for each entry)         │
//! ├────────────────────────────────────────┤
//! │ Index Block                            │
//! ├────────────────────────────────────────┤
//! │ Footer                                 │
//! │ ┌──────────────────┬─────────────────┐ │
//! │ │ Index Offset     │    CRC32        │ │
//! │ └──────────────────┴─────────────────┘ │
//! └────────────────────────────────────────┘
//! ```

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
