//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, StoreError};

use super::entry::parse_header;
use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset just past the last entry returned successfully
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a complete, checksum-valid entry
    /// - `Ok(None)`: clean end of file
    /// - `Err(WalCorruption)`: partial or damaged entry
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_fully(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(StoreError::WalCorruption(format!(
                "partial header at offset {} ({} of {} bytes)",
                self.position, read, HEADER_SIZE
            )));
        }

        let (lsn, _, len) = parse_header(&header)?;

        let mut bytes = vec![0u8; HEADER_SIZE + len as usize];
        bytes[..HEADER_SIZE].copy_from_slice(&header);
        let read = read_fully(&mut self.reader, &mut bytes[HEADER_SIZE..])?;
        if read < len as usize {
            return Err(StoreError::WalCorruption(format!(
                "partial entry {} at offset {} ({} of {} data bytes)",
                lsn, self.position, read, len
            )));
        }

        let entry = WalEntry::deserialize(&bytes)?;
        self.position += bytes.len() as u64;
        Ok(Some(entry))
    }

    /// Offset of the end of the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
///
/// Yields at most one error, then stops: nothing after a damaged entry can be
/// trusted to be framed correctly.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the file allows, returning the number of bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
