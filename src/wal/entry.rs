//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on the data section of a single entry (64 MB)
///
/// Anything larger is treated as a garbage length field.
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single key write inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOp {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl WriteOp {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Approximate in-memory footprint, used for flush accounting
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// A single entry in the WAL: one committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,

    /// The writes of the batch, in commit order
    pub operations: Vec<WriteOp>,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<WriteOp>) -> Self {
        Self {
            lsn,
            timestamp: now_millis(),
            operations,
        }
    }

    /// Serialize to the on-disk framing
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode(self.lsn, self.timestamp, &self.operations)
    }

    /// Deserialize one entry from the start of `bytes`, verifying its CRC
    ///
    /// Trailing bytes after the entry are ignored.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::WalCorruption(format!(
                "entry header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&bytes[..HEADER_SIZE]);
        let (lsn, crc, len) = parse_header(&header)?;

        let end = HEADER_SIZE + len as usize;
        if bytes.len() < end {
            return Err(StoreError::WalCorruption(format!(
                "entry {} truncated: expected {} data bytes, got {}",
                lsn,
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        decode_body(lsn, crc, &bytes[HEADER_SIZE..end])
    }
}

/// Frame a batch without building a `WalEntry` first
pub(super) fn encode(lsn: u64, timestamp: u64, operations: &[WriteOp]) -> Result<Vec<u8>> {
    let data = bincode::serialize(&(timestamp, operations))?;
    if data.len() > MAX_ENTRY_SIZE as usize {
        return Err(StoreError::WalWrite(format!(
            "batch of {} bytes exceeds the {} byte entry limit",
            data.len(),
            MAX_ENTRY_SIZE
        )));
    }

    let len = data.len() as u32;
    let crc = compute_crc(lsn, len, &data);

    let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
    bytes.extend_from_slice(&lsn.to_le_bytes());
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&len.to_le_bytes());
    bytes.extend_from_slice(&data);
    Ok(bytes)
}

/// Split a header into (lsn, crc, data_len)
pub(super) fn parse_header(header: &[u8; HEADER_SIZE]) -> Result<(u64, u32, u32)> {
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&header[0..8]);
    crc.copy_from_slice(&header[8..12]);
    len.copy_from_slice(&header[12..16]);

    let lsn = u64::from_le_bytes(lsn);
    let len = u32::from_le_bytes(len);
    if len > MAX_ENTRY_SIZE {
        return Err(StoreError::WalCorruption(format!(
            "entry {} claims {} data bytes",
            lsn, len
        )));
    }
    Ok((lsn, u32::from_le_bytes(crc), len))
}

/// Verify the checksum and decode the data section
fn decode_body(lsn: u64, crc: u32, data: &[u8]) -> Result<WalEntry> {
    let actual = compute_crc(lsn, data.len() as u32, data);
    if actual != crc {
        return Err(StoreError::WalCorruption(format!(
            "CRC mismatch in entry {}: expected {:08x}, got {:08x}",
            lsn, crc, actual
        )));
    }

    let (timestamp, operations): (u64, Vec<WriteOp>) = bincode::deserialize(data)
        .map_err(|e| StoreError::WalCorruption(format!("entry {} undecodable: {}", lsn, e)))?;

    Ok(WalEntry {
        lsn,
        timestamp,
        operations,
    })
}

/// CRC over LSN, length and data, so a damaged header is caught too
pub(super) fn compute_crc(lsn: u64, len: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}

pub(super) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
