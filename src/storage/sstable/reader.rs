//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, StoreError};

use super::iterator::SSTableIterator;
use super::{read_u32, read_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// The file handle sits behind a mutex so lookups take `&self` and a reader
/// can be shared between concurrent snapshots.
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the entire index into memory and verifies the data checksum.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(StoreError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(StoreError::Storage(format!(
                "Invalid SSTable magic in {}: got {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(StoreError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header, 6);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer, 0);
        let data_crc = read_u32(&footer, 8);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(StoreError::Storage(format!(
                "SSTable {} has index offset {} outside the file",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(StoreError::Storage(format!(
                "SSTable {} data checksum mismatch: expected {:08x}, got {:08x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }
        drop(data);

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(StoreError::Storage(format!(
                    "SSTable {} index block truncated",
                    path.display()
                )));
            }
            let key_len = read_u32(&index_data, pos) as usize;
            let offset = read_u64(&index_data, pos + 4);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(StoreError::Storage(format!(
                    "SSTable {} index key truncated",
                    path.display()
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(StoreError::Storage(format!(
                "SSTable {} header says {} entries, index has {}",
                path.display(),
                entry_count,
                index.len()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key: O(log n) lookup via in-memory index
    ///
    /// Returns `Ok(None)` when the key is not in this table.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        let mut file = self.file.lock();
        let mut entries = SSTableIterator::new(&mut *file, offset, self.index_offset)?;
        match entries.next() {
            Some(Ok((found, value))) if found == key => Ok(Some(value)),
            Some(Ok(_)) | None => Err(StoreError::Storage(format!(
                "SSTable {} index points at the wrong entry",
                self.path.display()
            ))),
            Some(Err(e)) => Err(e),
        }
    }

    /// Visit every entry whose key starts with `prefix`, in key order
    ///
    /// An empty prefix visits the whole table.
    pub fn scan_prefix<F>(&self, prefix: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(Vec<u8>, Vec<u8>) -> Result<()>,
    {
        let start = match self.index.range(prefix.to_vec()..).next() {
            Some((key, &offset)) if key.starts_with(prefix) => offset,
            _ => return Ok(()),
        };

        let mut file = self.file.lock();
        for entry in SSTableIterator::new(&mut *file, start, self.index_offset)? {
            let (key, value) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            visit(key, value)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }
}
