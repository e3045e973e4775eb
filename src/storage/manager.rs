//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Build new SSTables from MemTable flushes
//! - Merge all SSTables into one (full compaction)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - Readers are `Arc`s, so a snapshot stays usable after the list changes
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - Building a table (`write_sstable`, `write_merged`) never touches the list;
///   publishing it (`install`, `replace_all`) is a separate short step
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<Arc<SSTableReader>>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files, removing leftover `.tmp` files
    /// 3. Open readers for each (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }

            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            } else if file_path.extension().is_some_and(|ext| ext == "tmp") {
                // Interrupted build; never published
                tracing::warn!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
            }
        }

        // Sort newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let reader = SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?;
            sstables.push(Arc::new(reader));
        }

        // Next ID = max + 1, or 1 if no SSTables exist
        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(count = sstables.len(), next_id, "storage opened");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Self::get_from(&self.snapshot(), key)
    }

    /// Point lookup over an explicit table list (newest first)
    pub fn get_from(sstables: &[Arc<SSTableReader>], key: &[u8]) -> Result<Option<Vec<u8>>> {
        for reader in sstables {
            // Skip SSTable if key is outside its range (O(1) check)
            if !reader.might_contain(key) {
                continue;
            }
            if let Some(value) = reader.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Current table list, newest first
    pub fn snapshot(&self) -> Vec<Arc<SSTableReader>> {
        self.sstables.read().clone()
    }

    /// Write sorted entries to a new SSTable file without publishing it
    pub fn write_sstable(
        &self,
        entries: &BTreeMap<Vec<u8>, Vec<u8>>,
    ) -> Result<(SSTable, Arc<SSTableReader>)> {
        let path = self.next_path();
        let mut builder = SSTableBuilder::new(&path)?;
        for (key, value) in entries {
            builder.add(key, value)?;
        }
        let metadata = builder.finish()?;
        let reader = SSTableReader::open(&path)?;

        tracing::debug!(
            path = %metadata.path.display(),
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "SSTable written"
        );

        Ok((metadata, Arc::new(reader)))
    }

    /// Merge `tables` (newest first) into one new SSTable without publishing it
    ///
    /// For keys present in several tables the newest value wins.
    pub fn write_merged(
        &self,
        tables: &[Arc<SSTableReader>],
    ) -> Result<(SSTable, Arc<SSTableReader>)> {
        let mut merged = BTreeMap::new();
        for reader in tables.iter().rev() {
            reader.scan_prefix(b"", |key, value| {
                merged.insert(key, value);
                Ok(())
            })?;
        }
        self.write_sstable(&merged)
    }

    /// Publish a freshly written table as the newest one
    pub fn install(&self, reader: Arc<SSTableReader>) {
        self.sstables.write().insert(0, reader);
    }

    /// Swap the whole table list for `reader` and delete the replaced files
    ///
    /// Snapshots taken earlier keep their open handles to the old tables.
    pub fn replace_all(&self, reader: Arc<SSTableReader>) -> Result<()> {
        let old = std::mem::replace(&mut *self.sstables.write(), vec![reader]);
        for table in old {
            fs::remove_file(table.path())?;
        }
        Ok(())
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn next_path(&self) -> PathBuf {
        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    /// Generate SSTable path given a directory and ID
    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
