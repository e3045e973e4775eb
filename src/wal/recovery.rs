//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN (0 if none)
    pub last_lsn: u64,

    /// Whether the WAL was (or, for `verify`, would be) truncated
    pub was_truncated: bool,
}

/// Outcome of a read-only pass over the log
struct Scan {
    entries: Vec<WalEntry>,
    valid_len: u64,
    file_len: u64,
    result: RecoveryResult,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first partial or corrupted entry
    /// 3. Truncate the file there, dropping the damaged tail
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let scan = Self::scan(path)?;

        if scan.valid_len < scan.file_len {
            tracing::warn!(
                path = %path.display(),
                valid_bytes = scan.valid_len,
                file_bytes = scan.file_len,
                "truncating damaged WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        Ok((scan.entries, scan.result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Ok(Self::scan(path)?.result)
    }

    fn scan(path: &Path) -> Result<Scan> {
        let file_len = std::fs::metadata(path)?.len();
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut entries_corrupted = 0;

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "WAL scan stopped");
                    entries_corrupted = 1;
                    break;
                }
            }
        }

        let valid_len = reader.position();
        let result = RecoveryResult {
            entries_recovered: entries.len() as u64,
            entries_corrupted,
            last_lsn: entries.last().map(|e| e.lsn).unwrap_or(0),
            was_truncated: valid_len < file_len,
        };

        Ok(Scan {
            entries,
            valid_len,
            file_len,
            result,
        })
    }
}
