//! Page records
//!
//! The persisted [`Page`] and the typed [`PageDraft`] request it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Leading byte of every encoded page; bump when the layout changes
const RECORD_VERSION: u8 = 1;

/// A published Markdown document plus author metadata
///
/// `id` and `name` never change after creation. `html` is always the
/// rendering of the current `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Secret capability token granting edit rights
    pub id: String,
    /// Public key: title slug plus a random suffix
    pub name: String,
    pub title: String,
    /// Raw Markdown source
    pub content: String,
    /// Rendered markup of `content`
    pub html: String,
    pub author: String,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Encode for storage: version byte followed by bincode
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![RECORD_VERSION];
        bincode::serialize_into(&mut bytes, self)?;
        Ok(bytes)
    }

    /// Decode a stored record
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&RECORD_VERSION, body)) => Ok(bincode::deserialize(body)?),
            Some((version, _)) => Err(StoreError::Serialization(format!(
                "unknown page record version {}",
                version
            ))),
            None => Err(StoreError::Serialization("empty page record".to_string())),
        }
    }
}

/// Fields an author submits when creating or editing a page
///
/// Empty strings mean "not provided" for the optional profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDraft {
    pub title: String,
    pub content: String,
    pub author: String,
    pub website: String,
    pub twitter: String,
    pub github: String,
    pub facebook: String,
    pub instagram: String,
}

impl PageDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    pub fn twitter(mut self, handle: impl Into<String>) -> Self {
        self.twitter = handle.into();
        self
    }

    pub fn github(mut self, handle: impl Into<String>) -> Self {
        self.github = handle.into();
        self
    }

    pub fn facebook(mut self, handle: impl Into<String>) -> Self {
        self.facebook = handle.into();
        self
    }

    pub fn instagram(mut self, handle: impl Into<String>) -> Self {
        self.instagram = handle.into();
        self
    }
}
