//! Publishing flows
//!
//! Create, update, lookup and view on top of [`PageStore`], plus the sitemap.
//! Validation and permission checks run before any storage write.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Duration;

use crate::config::PublishConfig;
use crate::error::{PublishError, StoreError};
use crate::page::{Page, PageDraft};
use crate::page_store::PageStore;
use crate::providers::{Clock, MarkdownRenderer, RandomTokens, Renderer, SystemClock, TokenSource};
use crate::validate::{self, HandleKind};

/// Draft fields after validation, ready to be copied into a page
struct Checked {
    slug: String,
    website: Option<String>,
    handles: [Option<String>; 4],
}

/// Orchestrates page creation and editing
///
/// Holds no mutable state of its own; share it across threads behind an `Arc`.
pub struct Publisher {
    store: Arc<PageStore>,
    renderer: Arc<dyn Renderer>,
    tokens: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    slugify: fn(&str) -> String,
    config: PublishConfig,
}

impl Publisher {
    /// Publisher with the default renderer, token source, clock and slugger
    pub fn new(store: Arc<PageStore>) -> Self {
        Self {
            store,
            renderer: Arc::new(MarkdownRenderer),
            tokens: Arc::new(RandomTokens),
            clock: Arc::new(SystemClock),
            slugify: validate::slugify,
            config: PublishConfig::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_slugifier(mut self, slugify: fn(&str) -> String) -> Self {
        self.slugify = slugify;
        self
    }

    pub fn with_config(mut self, config: PublishConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Validate a draft and store it as a new page
    pub fn create(&self, draft: PageDraft) -> Result<Page, PublishError> {
        let checked = self.check(&draft)?;

        let id = self.tokens.random_string(self.config.id_length);
        let suffix = self.tokens.random_string(self.config.suffix_length);
        let name = format!("{}-{}", checked.slug, suffix);

        let now = self.clock.now();
        let [twitter, github, facebook, instagram] = checked.handles;
        let page = Page {
            id,
            name,
            html: self.renderer.render(&draft.content),
            title: draft.title,
            content: draft.content,
            author: draft.author,
            website: checked.website,
            twitter,
            github,
            facebook,
            instagram,
            created_at: now,
            updated_at: now,
        };

        self.store.put(&page)?;
        tracing::info!(name = %page.name, "page created");
        Ok(page)
    }

    /// Replace the editable fields of an existing page
    ///
    /// `id` must match the stored id for `name`. The page keeps its id, name
    /// and creation time.
    pub fn update(&self, id: &str, name: &str, draft: PageDraft) -> Result<Page, PublishError> {
        let mut page = self
            .store
            .get_by_name(name)?
            .ok_or(PublishError::NotFound("This page name does not exist."))?;

        if page.id != id {
            tracing::debug!(name, "update rejected: id mismatch");
            return Err(PublishError::PermissionDenied);
        }

        let checked = self.check(&draft)?;
        let [twitter, github, facebook, instagram] = checked.handles;

        page.html = self.renderer.render(&draft.content);
        page.title = draft.title;
        page.content = draft.content;
        page.author = draft.author;
        page.website = checked.website;
        page.twitter = twitter;
        page.github = github;
        page.facebook = facebook;
        page.instagram = instagram;

        // updated_at must move forward even if the clock does not
        let now = self.clock.now();
        page.updated_at = if now > page.updated_at {
            now
        } else {
            page.updated_at + Duration::microseconds(1)
        };

        self.store.put(&page)?;
        tracing::info!(name = %page.name, "page updated");
        Ok(page)
    }

    /// Find a page by its secret id
    pub fn lookup(&self, id: &str) -> Result<Option<Page>, PublishError> {
        let page = self.store.get_by_id(id)?;
        tracing::debug!(found = page.is_some(), "lookup by id");
        Ok(page)
    }

    /// Find a page by its public name
    pub fn view(&self, name: &str) -> Result<Option<Page>, PublishError> {
        let page = self.store.get_by_name(name)?;
        tracing::debug!(name, found = page.is_some(), "view");
        Ok(page)
    }

    /// Plain-text sitemap: the site root, then every page in name order
    pub fn sitemap(&self, base_url: &str) -> Result<String, PublishError> {
        let base_url = base_url.trim_end_matches('/');
        let mut out = format!("{}/\n", base_url);
        self.store.iterate_all(|name, _page| {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{}/{}", base_url, name);
            Ok::<(), StoreError>(())
        })?;
        Ok(out)
    }

    /// Run every field check in order, stopping at the first failure
    fn check(&self, draft: &PageDraft) -> Result<Checked, PublishError> {
        let result = self.check_fields(draft);
        if let Err(PublishError::Validation { field, message }) = &result {
            tracing::debug!(field, message, "draft rejected");
        }
        result
    }

    fn check_fields(&self, draft: &PageDraft) -> Result<Checked, PublishError> {
        let slug = (self.slugify)(&draft.title);
        if slug.is_empty() {
            return Err(PublishError::validation("title", "Provide a title"));
        }

        let website = if draft.website.is_empty() {
            None
        } else {
            let normalized = validate::normalize_url(&draft.website)
                .ok_or_else(|| PublishError::validation("website", "Invalid website URL"))?;
            Some(normalized)
        };

        let raw = [
            &draft.twitter,
            &draft.github,
            &draft.facebook,
            &draft.instagram,
        ];
        let mut handles: [Option<String>; 4] = Default::default();
        for ((kind, handle), slot) in HandleKind::ALL.into_iter().zip(raw).zip(&mut handles) {
            if handle.is_empty() {
                continue;
            }
            if !validate::is_valid_handle(kind, handle, self.config.handle_charset) {
                return Err(PublishError::validation(kind.field(), kind.error_message()));
            }
            *slot = Some(handle.clone());
        }

        Ok(Checked {
            slug,
            website,
            handles,
        })
    }
}
