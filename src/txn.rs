//! Transactions
//!
//! [`WriteTxn`] buffers writes across any number of buckets and commits them
//! as one WAL entry. [`Snapshot`] is a point-in-time read view.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::MutexGuard;

use crate::bucket::Bucket;
use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::memtable::MemTableSnapshot;
use crate::storage::{SSTableReader, StorageManager};
use crate::wal::WriteOp;

/// An open write transaction
///
/// Holds the engine's writer lock for its whole lifetime. Nothing is visible
/// to readers or written to disk until [`WriteTxn::commit`]; dropping the
/// transaction discards its writes.
pub struct WriteTxn<'a> {
    engine: &'a Engine,
    _writer: MutexGuard<'a, ()>,
    ops: Vec<WriteOp>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(engine: &'a Engine, writer: MutexGuard<'a, ()>) -> Self {
        Self {
            engine,
            _writer: writer,
            ops: Vec::new(),
        }
    }

    /// Stage a write of `key` in `bucket`
    pub fn put(&mut self, bucket: Bucket, key: &[u8], value: &[u8]) {
        self.ops.push(WriteOp::new(bucket.key(key), value));
    }

    /// Read `key`, seeing this transaction's own staged writes first
    ///
    /// No other writer can commit while this transaction is open, so the
    /// committed state read here cannot change before commit.
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let physical = bucket.key(key);
        if let Some(op) = self.ops.iter().rev().find(|op| op.key == physical) {
            return Ok(Some(op.value.clone()));
        }
        self.engine.snapshot().get_physical(&physical)
    }

    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commit every staged write atomically
    ///
    /// Returns the WAL sequence number of the batch, or `None` when nothing was
    /// staged.
    pub fn commit(self) -> Result<Option<u64>> {
        if self.ops.is_empty() {
            return Ok(None);
        }
        self.engine.commit_batch(&self.ops).map(Some)
    }
}

/// A consistent, point-in-time read view
///
/// Cheap to create and independent of the engine's locks once created:
/// commits, flushes and compactions that happen afterwards are not observed.
#[derive(Clone)]
pub struct Snapshot {
    memtable: MemTableSnapshot,
    /// Newest first
    sstables: Vec<Arc<SSTableReader>>,
}

impl Snapshot {
    pub(crate) fn new(memtable: MemTableSnapshot, sstables: Vec<Arc<SSTableReader>>) -> Self {
        Self { memtable, sstables }
    }

    /// Point lookup of `key` in `bucket`
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_physical(&bucket.key(key))
    }

    fn get_physical(&self, physical: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.memtable.get(physical) {
            return Ok(Some(value.clone()));
        }
        StorageManager::get_from(&self.sstables, physical)
    }

    /// Visit every entry of `bucket` in ascending key order
    ///
    /// Stops at, and returns, the first error produced by `visit`.
    pub fn for_each<E, F>(&self, bucket: Bucket, mut visit: F) -> std::result::Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], &[u8]) -> std::result::Result<(), E>,
    {
        let prefix = bucket.prefix();

        // Oldest table first so newer versions overwrite older ones
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for reader in self.sstables.iter().rev() {
            reader.scan_prefix(&prefix, |key, value| {
                merged.insert(key, value);
                Ok(())
            })?;
        }
        for (key, value) in self.memtable.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            merged.insert(key.clone(), value.clone());
        }

        for (key, value) in &merged {
            visit(&key[prefix.len()..], value)?;
        }
        Ok(())
    }
}
