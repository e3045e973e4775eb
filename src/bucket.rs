//! Buckets
//!
//! A bucket is a named key space inside the single engine. Physical keys are
//! `name | 0x00 | user key`, so every bucket occupies one contiguous,
//! ordered range and no bucket's range overlaps another's.

/// A named logical namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bucket {
    name: &'static str,
}

impl Bucket {
    /// Bucket names must not contain NUL
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Prefix shared by every physical key in this bucket
    pub fn prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(self.name.len() + 1);
        prefix.extend_from_slice(self.name.as_bytes());
        prefix.push(0);
        prefix
    }

    /// Physical key for `key` in this bucket
    pub fn key(&self, key: &[u8]) -> Vec<u8> {
        let mut physical = self.prefix();
        physical.extend_from_slice(key);
        physical
    }

    /// User key of a physical key, if it belongs to this bucket
    pub fn strip<'a>(&self, physical: &'a [u8]) -> Option<&'a [u8]> {
        physical
            .strip_prefix(self.name.as_bytes())?
            .strip_prefix(&[0u8])
    }
}
