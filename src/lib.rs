//! # pagekv
//!
//! Storage core for an anonymous Markdown publishing service:
//! - Pages stored under their public name, editable only with a secret id
//! - Two indexes (by-name, by-id) kept consistent by atomic write batches
//! - Write-Ahead Logging (WAL) for durability and crash recovery
//! - Single-writer/multi-reader concurrency with snapshot reads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Publisher                             │
//! │        (validate → render → create / update / view)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        PageStore                             │
//! │           by-name: name → Page    by-id: id → name           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  WriteTxn / Snapshot
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Engine                               │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod bucket;
pub mod txn;
pub mod engine;

pub mod page;
pub mod validate;
pub mod providers;
pub mod page_store;
pub mod publisher;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use bucket::Bucket;
pub use config::{Config, PublishConfig, WalSyncStrategy};
pub use engine::Engine;
pub use error::{PublishError, Result, StoreError};
pub use page::{Page, PageDraft};
pub use page_store::PageStore;
pub use publisher::Publisher;
pub use txn::{Snapshot, WriteTxn};
pub use validate::{HandleCharset, HandleKind};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pagekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
