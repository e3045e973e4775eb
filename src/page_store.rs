//! Page Store
//!
//! Pages kept under two indexes in one engine:
//!
//! ```text
//! by-name:  name → encoded Page
//! by-id:    id   → name
//! ```
//!
//! Both indexes are written in the same transaction, so a reader never sees
//! one without the other.

use std::path::Path;

use crate::bucket::Bucket;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::page::Page;
use crate::txn::Snapshot;

/// Primary index: public name → page record
pub const BY_NAME: Bucket = Bucket::new("by-name");

/// Secondary index: secret id → name
pub const BY_ID: Bucket = Bucket::new("by-id");

/// Durable page storage with lookup by name or by id
pub struct PageStore {
    engine: Engine,
}

impl PageStore {
    /// Open or create a store with the given config
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::from_engine(Engine::open(config)?))
    }

    /// Open with default settings in `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Ok(Self::from_engine(Engine::open_path(path)?))
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self { engine }
    }

    /// Write a page under both indexes in one transaction
    ///
    /// Fails with [`StoreError::Conflict`] instead of letting an id move to a
    /// different name, or a name be taken over by a different id.
    pub fn put(&self, page: &Page) -> Result<()> {
        let record = page.encode()?;

        let mut txn = self.engine.begin_write();

        if let Some(owner) = txn.get(BY_ID, page.id.as_bytes())? {
            if owner != page.name.as_bytes() {
                return Err(StoreError::Conflict(format!(
                    "id is already bound to page {:?}",
                    String::from_utf8_lossy(&owner)
                )));
            }
        }
        if let Some(existing) = txn.get(BY_NAME, page.name.as_bytes())? {
            if Page::decode(&existing)?.id != page.id {
                return Err(StoreError::Conflict(format!(
                    "page {:?} belongs to another id",
                    page.name
                )));
            }
        }

        txn.put(BY_NAME, page.name.as_bytes(), &record);
        txn.put(BY_ID, page.id.as_bytes(), page.name.as_bytes());
        txn.commit()?;

        tracing::debug!(name = %page.name, bytes = record.len(), "page stored");
        Ok(())
    }

    /// Look a page up by its public name
    ///
    /// `Ok(None)` means there is no such page; errors are storage faults only.
    pub fn get_by_name(&self, name: &str) -> Result<Option<Page>> {
        Self::read_by_name(&self.engine.snapshot(), name)
    }

    /// Look a page up by its secret id
    ///
    /// Both hops read the same snapshot. An id whose page is missing is
    /// reported as [`StoreError::Inconsistent`].
    pub fn get_by_id(&self, id: &str) -> Result<Option<Page>> {
        let snapshot = self.engine.snapshot();

        let name = match snapshot.get(BY_ID, id.as_bytes())? {
            Some(name) => String::from_utf8(name)
                .map_err(|e| StoreError::Serialization(format!("by-id entry: {}", e)))?,
            None => return Ok(None),
        };

        match Self::read_by_name(&snapshot, &name)? {
            Some(page) => Ok(Some(page)),
            None => Err(StoreError::Inconsistent(format!(
                "id entry points at missing page {:?}",
                name
            ))),
        }
    }

    /// Visit every page in ascending name order
    ///
    /// Reads one snapshot; stops at and returns the first error from `visit`.
    pub fn iterate_all<E, F>(&self, mut visit: F) -> std::result::Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&str, &Page) -> std::result::Result<(), E>,
    {
        self.engine.snapshot().for_each(BY_NAME, |key, value| {
            let name = std::str::from_utf8(key)
                .map_err(|e| StoreError::Serialization(format!("page name: {}", e)))?;
            let page = Page::decode(value)?;
            visit(name, &page)
        })
    }

    fn read_by_name(snapshot: &Snapshot, name: &str) -> Result<Option<Page>> {
        snapshot
            .get(BY_NAME, name.as_bytes())?
            .map(|bytes| Page::decode(&bytes))
            .transpose()
    }

    /// The underlying engine (flush, compaction, stats)
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Flush and close
    pub fn close(self) -> Result<()> {
        self.engine.close()
    }
}
