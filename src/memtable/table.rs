//! MemTable implementation
//!
//! Copy-on-write BTreeMap behind a RwLock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::wal::WriteOp;

/// Immutable view of the memtable at one point in time
pub type MemTableSnapshot = Arc<BTreeMap<Vec<u8>, Vec<u8>>>;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<MemTableSnapshot>,
    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Arc::new(BTreeMap::new())),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Put a single key-value pair, returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.apply(&[WriteOp { key, value }])
    }

    /// Apply a batch under one write lock, returning the new approximate size
    ///
    /// Readers see either none or all of the batch.
    pub fn apply(&self, batch: &[WriteOp]) -> usize {
        let mut guard = self.data.write();
        let map = Arc::make_mut(&mut *guard);

        for op in batch {
            let added = op.size();
            match map.insert(op.key.clone(), op.value.clone()) {
                Some(old) => {
                    // Key already counted; only the value length changes
                    self.size.fetch_add(op.value.len(), Ordering::Relaxed);
                    self.size.fetch_sub(old.len(), Ordering::Relaxed);
                }
                None => {
                    self.size.fetch_add(added, Ordering::Relaxed);
                }
            }
        }

        self.size.load(Ordering::Relaxed)
    }

    /// Capture the current contents
    pub fn snapshot(&self) -> MemTableSnapshot {
        Arc::clone(&self.data.read())
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Clear all entries (after successful flush)
    ///
    /// Outstanding snapshots keep the old contents.
    pub fn clear(&self) {
        let mut guard = self.data.write();
        *guard = Arc::new(BTreeMap::new());
        self.size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
