//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Whole batches become visible at once
//! - Cheap point-in-time snapshots for readers
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation
//!
//! ## Data Structure Choice
//! An `Arc<BTreeMap>` behind a RwLock:
//! - Ordered keys (required for SSTable generation and bucket scans)
//! - A snapshot is an `Arc` clone; a writer only copies the map while a
//!   snapshot of it is still alive

mod table;

pub use table::{MemTable, MemTableSnapshot};
