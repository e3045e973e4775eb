//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Hand out write transactions (one at a time) and read snapshots
//! - Trigger flushes when MemTable is full, compaction when tables pile up
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::txn::{Snapshot, WriteTxn};
use crate::wal::{WalRecovery, WalWriter, WriteOp};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes**: a [`WriteTxn`] holds `write_lock` from `begin_write` until
///   commit or drop, so only ONE batch is being assembled/committed at a time.
///   Commit order: WAL append → memtable apply → optional flush/compaction.
///
/// - **Reads**: a [`Snapshot`] captures the memtable map and the SSTable list
///   together under a brief `view_lock` read guard, then reads without any
///   engine lock. Flush and compaction take `view_lock` for writing only
///   while they swap the memtable/table list, so a snapshot never sees data
///   twice or not at all.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write transactions, flushes and compactions
    write_lock: Mutex<()>,

    /// Guards the memtable/SSTable handover against snapshot capture
    view_lock: RwLock<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config, create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush recovered batches to an SSTable
    /// 4. Truncate the WAL and start accepting writes
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        // Paths are derived from data_dir, not configurable
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            // Whole batches only: a damaged entry was cut off above
            for entry in entries {
                memtable.apply(&entry.operations);
            }

            // Make recovered data durable in an SSTable before the WAL is cleared
            if !memtable.is_empty() {
                tracing::info!(
                    entries = memtable.entry_count(),
                    "flushing recovered entries to SSTable"
                );
                let (_, reader) = storage.write_sstable(&memtable.snapshot())?;
                storage.install(reader);
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            "engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            view_lock: RwLock::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Start a write transaction, waiting for any other writer to finish
    pub fn begin_write(&self) -> WriteTxn<'_> {
        WriteTxn::new(self, self.write_lock.lock())
    }

    /// Capture a consistent read view
    pub fn snapshot(&self) -> Snapshot {
        let _view = self.view_lock.read();
        Snapshot::new(self.memtable.snapshot(), self.storage.snapshot())
    }

    /// Commit a batch; caller holds `write_lock` through its `WriteTxn`
    ///
    /// The batch is committed once the WAL append returns. Flush and
    /// compaction failures after that point are logged, not returned: the
    /// data is already durable and the work is retried on the next commit.
    pub(crate) fn commit_batch(&self, batch: &[WriteOp]) -> Result<u64> {
        let lsn = self.wal.lock().append(batch)?;

        let new_size = self.memtable.apply(batch);
        tracing::trace!(lsn, writes = batch.len(), memtable_bytes = new_size, "batch committed");

        if self.memtable.should_flush(self.config.memtable_size_limit) {
            if let Err(e) = self.flush_internal() {
                tracing::warn!(error = %e, "memtable flush failed, will retry");
                return Ok(lsn);
            }
        }

        if self.storage.sstable_count() > self.config.max_sstables {
            if let Err(e) = self.compact_internal() {
                tracing::warn!(error = %e, "compaction failed, will retry");
            }
        }

        Ok(lsn)
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        // Step 1: Build the SSTable from a snapshot (no readers blocked)
        let (metadata, reader) = self.storage.write_sstable(&self.memtable.snapshot())?;

        // Step 2: Publish table and clear memtable in one view transition
        {
            let _view = self.view_lock.write();
            self.storage.install(reader);
            self.memtable.clear();
        }

        // Step 3: Truncate WAL (entries are now durable in SSTable)
        self.wal.lock().truncate()?;

        tracing::info!(
            entries = metadata.entry_count,
            sstables = self.storage.sstable_count(),
            "memtable flushed"
        );
        Ok(())
    }

    /// Merge all SSTables into one
    pub fn compact(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.compact_internal()
    }

    /// Internal compaction (called with write lock held)
    fn compact_internal(&self) -> Result<()> {
        let tables = self.storage.snapshot();
        if tables.len() < 2 {
            return Ok(());
        }

        let (metadata, reader) = self.storage.write_merged(&tables)?;

        {
            let _view = self.view_lock.write();
            self.storage.replace_all(reader)?;
        }

        tracing::info!(
            merged = tables.len(),
            entries = metadata.entry_count,
            "SSTables compacted"
        );
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        tracing::info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
