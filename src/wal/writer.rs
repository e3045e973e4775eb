//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, StoreError};

use super::entry::{encode, now_millis};
use super::{WalRecovery, WriteOp};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    /// Unbuffered: every entry is a single write_all of a pre-framed buffer
    file: File,
    /// LSN the next append will receive
    next_lsn: u64,
    /// Length of the file up to the end of the last complete entry
    len: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    #[cfg(test)]
    fail_next_sync: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// Existing entries are kept; numbering continues after the last valid one.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let existing = WalRecovery::verify(path)?;
        if existing.was_truncated {
            return Err(StoreError::WalCorruption(format!(
                "{} has a damaged tail; run recovery before appending",
                path.display()
            )));
        }

        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: existing.last_lsn + 1,
            len,
            sync_strategy,
            unsynced: 0,
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    /// Append one batch as a single entry, returning its LSN
    ///
    /// On failure the file is cut back to its previous length so that a torn
    /// entry never sits in front of later ones.
    pub fn append(&mut self, operations: &[WriteOp]) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = encode(lsn, now_millis(), operations)?;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback();
            return Err(StoreError::WalWrite(format!("append of entry {} failed: {}", lsn, e)));
        }

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };
        if due {
            // Not committed until durable
            if let Err(e) = self.sync_file() {
                self.rollback();
                return Err(StoreError::WalWrite(format!("sync of entry {} failed: {}", lsn, e)));
            }
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }

        self.len += bytes.len() as u64;
        self.next_lsn += 1;
        Ok(lsn)
    }

    /// Best effort: drop whatever part of a failed entry reached the file
    fn rollback(&mut self) {
        let restored = self
            .file
            .set_len(self.len)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.len)).map(|_| ()));
        if let Err(e) = restored {
            tracing::error!(path = %self.path.display(), error = %e, "WAL rollback failed");
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.sync_file()?;
        self.unsynced = 0;
        Ok(())
    }

    fn sync_file(&mut self) -> std::io::Result<()> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_sync) {
            return Err(std::io::Error::other("injected fsync failure"));
        }
        self.file.sync_data()
    }

    /// Discard all entries (their contents are durable elsewhere)
    ///
    /// LSNs keep increasing across truncation.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.len = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN the next append will receive
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Current length of the log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
