//! Collaborators injected into the [`Publisher`](crate::publisher::Publisher)
//!
//! Rendering, token generation and time are behind small traits so callers
//! (and tests) can swap them without touching the publishing logic.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Markdown to markup, assumed total and pure
pub trait Renderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// Source of unpredictable tokens, fresh on every call
pub trait TokenSource: Send + Sync {
    fn random_string(&self, length: usize) -> String;
}

/// Wall clock
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// CommonMark renderer with the usual GitHub-style extensions
///
/// Raw HTML in the source is not passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, source: &str) -> String {
        let mut options = comrak::Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.autolink = true;
        comrak::markdown_to_html(source, &options)
    }
}

/// Alphanumeric tokens from the thread-local CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn random_string(&self, length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
