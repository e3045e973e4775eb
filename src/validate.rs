//! Input validation
//!
//! Pure functions applied to a [`PageDraft`](crate::page::PageDraft) before
//! anything is written.

use url::Url;

/// Characters a social handle may use besides its platform's extra symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandleCharset {
    /// ASCII letters and digits
    #[default]
    LettersAndDigits,
    /// ASCII letters only
    LettersOnly,
}

/// The social profiles a page can link to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Twitter,
    GitHub,
    Facebook,
    Instagram,
}

impl HandleKind {
    pub const ALL: [HandleKind; 4] = [
        HandleKind::Twitter,
        HandleKind::GitHub,
        HandleKind::Facebook,
        HandleKind::Instagram,
    ];

    /// The one symbol allowed on top of letters (and digits)
    pub fn extra_symbol(self) -> Option<char> {
        match self {
            HandleKind::Twitter => Some('_'),
            HandleKind::GitHub => Some('-'),
            HandleKind::Facebook => Some('.'),
            HandleKind::Instagram => None,
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            HandleKind::Twitter => "twitter",
            HandleKind::GitHub => "github",
            HandleKind::Facebook => "facebook",
            HandleKind::Instagram => "instagram",
        }
    }

    pub fn error_message(self) -> &'static str {
        match self {
            HandleKind::Twitter => {
                "Invalid Twitter Handle. Only letters, numbers, and underscore allowed."
            }
            HandleKind::GitHub => "Invalid GitHub Handle. Only letters, numbers, and dash allowed.",
            HandleKind::Facebook => {
                "Invalid Facebook Handle. Only letters, numbers, and dot allowed."
            }
            HandleKind::Instagram => "Invalid Instagram Handle. Only letters and numbers allowed.",
        }
    }
}

/// Check a handle against its platform's alphabet, ignoring case
///
/// The empty handle is valid: every profile field is optional.
pub fn is_valid_handle(kind: HandleKind, handle: &str, charset: HandleCharset) -> bool {
    let extra = kind.extra_symbol();
    handle.chars().all(|c| {
        let c = c.to_ascii_lowercase();
        c.is_ascii_lowercase()
            || (charset == HandleCharset::LettersAndDigits && c.is_ascii_digit())
            || Some(c) == extra
    })
}

/// Parse a website as an absolute URL and return its normalized form
///
/// Returns `None` for anything that is not an absolute URL.
pub fn normalize_url(website: &str) -> Option<String> {
    Url::parse(website.trim()).ok().map(String::from)
}

/// URL-safe slug of a title
///
/// Transliterates to ASCII, lower-cases, turns every run of other characters
/// into a single `-`, and trims separators from both ends. Returns an empty
/// string when nothing sluggable remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars() {
        let folded = deunicode::deunicode_char(c).unwrap_or("");
        let mut emitted = false;
        for f in folded.chars() {
            if f.is_ascii_alphanumeric() {
                if pending_separator && !slug.is_empty() {
                    slug.push('-');
                }
                pending_separator = false;
                slug.push(f.to_ascii_lowercase());
                emitted = true;
            } else {
                pending_separator = true;
            }
        }
        if !emitted {
            pending_separator = true;
        }
    }

    slug
}
