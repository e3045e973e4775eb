//! SSTable Iterator
//!
//! Sequential iteration over a run of entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::Result;

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    /// Set after an error; nothing further is yielded
    failed: bool,
}

impl<'a> SSTableIterator<'a> {
    /// Create an iterator over `[start_offset, end_offset)` of the data block
    pub(super) fn new(
        file: &'a mut BufReader<File>,
        start_offset: u64,
        end_offset: u64,
    ) -> Result<Self> {
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: start_offset,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = super::read_u32(&header, 0) as usize;
        let val_len = super::read_u32(&header, 4) as usize;

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        self.current_offset += 8 + key_len as u64 + val_len as u64;
        Ok((key, value))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop at index block
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let entry = self.read_entry();
        self.failed = entry.is_err();
        Some(entry)
    }
}
