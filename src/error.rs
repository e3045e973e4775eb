//! Error types for pagekv
//!
//! Two layers, two enums:
//! - [`StoreError`] for everything below the page level (WAL, SSTables, engine)
//! - [`PublishError`] for the create/update/view flows, wrapping storage faults

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// A write would break a uniqueness invariant of the page indexes
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The two page indexes disagree with each other
    #[error("Index inconsistency: {0}")]
    Inconsistent(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the publishing flows
///
/// Everything except [`PublishError::Storage`] is a user-facing condition and
/// is detected before any storage mutation is attempted.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A field failed validation; `message` is meant to be shown verbatim
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Permission denied.")]
    PermissionDenied,

    #[error("storage fault: {0}")]
    Storage(#[from] StoreError),
}

impl PublishError {
    pub(crate) fn validation(field: &'static str, message: &'static str) -> Self {
        PublishError::Validation { field, message }
    }

    /// True for internal faults the caller should log and mask
    pub fn is_fault(&self) -> bool {
        matches!(self, PublishError::Storage(_))
    }
}
