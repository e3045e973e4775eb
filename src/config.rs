//! Configuration for pagekv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::validate::HandleCharset;

/// Storage configuration for an [`Engine`](crate::engine::Engine) instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL, SSTables)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Number of SSTables above which all tables are merged into one
    pub max_sstables: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every committed batch (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced batches (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./pagekv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            memtable_size_limit: 4 * 1024 * 1024, // 4 MB
            max_sstables: 8,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_limit == 0 {
            return Err(StoreError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(StoreError::Config(
                "EveryNEntries sync count must be greater than zero".to_string(),
            ));
        }
        if self.max_sstables < 2 {
            return Err(StoreError::Config(format!(
                "max_sstables must be at least 2, got {}",
                self.max_sstables
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the SSTable count that triggers a full compaction
    pub fn max_sstables(mut self, count: usize) -> Self {
        self.config.max_sstables = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Settings for the publishing flows
#[derive(Debug, Clone, Copy)]
pub struct PublishConfig {
    /// Length of the secret page id
    pub id_length: usize,

    /// Length of the random suffix appended to the title slug
    pub suffix_length: usize,

    /// Which characters social handles may contain besides their extra symbol
    pub handle_charset: HandleCharset,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            id_length: 16,
            suffix_length: 8,
            handle_charset: HandleCharset::LettersAndDigits,
        }
    }
}
