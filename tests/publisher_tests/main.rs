//! Tests for Publisher
//!
//! These tests verify:
//! - Create/View/Lookup agree on the same page
//! - Update keeps id, name and created_at and advances updated_at
//! - Permission and not-found handling leave storage untouched
//! - Validation messages and ordering
//! - Handle digit policy is configurable
//! - Sitemap output
//! - Concurrent creates never collide

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pagekv::providers::{Clock, Renderer, TokenSource};
use pagekv::{
    HandleCharset, PageDraft, PageStore, PublishConfig, PublishError, Publisher, StoreError,
};
use tempfile::TempDir;

// =============================================================================
// Fakes
// =============================================================================

/// Clock that advances one second per call
struct SteppingClock {
    ticks: AtomicU64,
}

impl SteppingClock {
    fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) as i64;
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(tick)
    }
}

/// Clock that never moves
struct FrozenClock;

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }
}

/// Deterministic, never-repeating tokens
struct CountingTokens {
    next: AtomicU64,
}

impl TokenSource for CountingTokens {
    fn random_string(&self, length: usize) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{:0>width$}", n, width = length)
    }
}

/// Wraps the source in a marker so tests can tell it was rendered
struct TaggingRenderer;

impl Renderer for TaggingRenderer {
    fn render(&self, source: &str) -> String {
        format!("<rendered>{}</rendered>", source)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_publisher() -> (TempDir, Publisher) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(PageStore::open_path(temp_dir.path()).unwrap());
    let publisher = Publisher::new(store)
        .with_clock(Arc::new(SteppingClock::new()))
        .with_tokens(Arc::new(CountingTokens {
            next: AtomicU64::new(1),
        }))
        .with_renderer(Arc::new(TaggingRenderer));
    (temp_dir, publisher)
}

fn draft(title: &str) -> PageDraft {
    PageDraft::new(title, "Some **markdown**")
        .author("anon")
        .website("https://example.com")
        .twitter("john_doe")
        .github("my-repo")
        .facebook("john.doe")
        .instagram("johndoe")
}

fn assert_validation(result: Result<impl std::fmt::Debug, PublishError>, field: &str, message: &str) {
    match result {
        Err(PublishError::Validation {
            field: got_field,
            message: got_message,
        }) => {
            assert_eq!(got_field, field);
            assert_eq!(got_message, message);
        }
        other => panic!("expected validation error on {}, got {:?}", field, other),
    }
}

fn page_count(publisher: &Publisher) -> usize {
    let mut n = 0;
    publisher
        .store()
        .iterate_all(|_, _| {
            n += 1;
            Ok::<(), StoreError>(())
        })
        .unwrap();
    n
}

// =============================================================================
// Create / View / Lookup
// =============================================================================

#[test]
fn test_create_then_view_and_lookup_return_same_page() {
    let (_temp, publisher) = setup_publisher();

    let created = publisher.create(draft("Hello World")).unwrap();

    assert!(!created.name.is_empty());
    assert_eq!(publisher.view(&created.name).unwrap(), Some(created.clone()));
    assert_eq!(publisher.lookup(&created.id).unwrap(), Some(created));
}

#[test]
fn test_create_fills_derived_fields() {
    let (_temp, publisher) = setup_publisher();

    let page = publisher.create(draft("Crème Brûlée, Again!")).unwrap();

    assert_eq!(page.id.len(), 16);
    assert!(page.name.starts_with("creme-brulee-again-"));
    assert_eq!(page.name.len(), "creme-brulee-again-".len() + 8);
    assert_eq!(page.html, "<rendered>Some **markdown**</rendered>");
    assert_eq!(page.created_at, page.updated_at);
    assert_eq!(page.website.as_deref(), Some("https://example.com/"));
    assert_eq!(page.twitter.as_deref(), Some("john_doe"));
}

#[test]
fn test_empty_profile_fields_are_stored_as_none() {
    let (_temp, publisher) = setup_publisher();

    let page = publisher.create(PageDraft::new("Bare", "text")).unwrap();

    assert_eq!(page.website, None);
    assert_eq!(page.twitter, None);
    assert_eq!(page.github, None);
    assert_eq!(page.facebook, None);
    assert_eq!(page.instagram, None);
    assert_eq!(page.author, "");
}

#[test]
fn test_accepted_handles_round_trip_byte_identical() {
    let (_temp, publisher) = setup_publisher();
    let input = PageDraft::new("Handles", "")
        .twitter("John_Doe42")
        .github("My-Repo")
        .facebook("Jane.Doe")
        .instagram("InstaUser");

    let created = publisher.create(input).unwrap();
    let stored = publisher.view(&created.name).unwrap().unwrap();

    assert_eq!(stored.twitter.as_deref(), Some("John_Doe42"));
    assert_eq!(stored.github.as_deref(), Some("My-Repo"));
    assert_eq!(stored.facebook.as_deref(), Some("Jane.Doe"));
    assert_eq!(stored.instagram.as_deref(), Some("InstaUser"));
}

#[test]
fn test_view_and_lookup_of_unknown_keys_are_none() {
    let (_temp, publisher) = setup_publisher();

    assert_eq!(publisher.view("no-such-page").unwrap(), None);
    assert_eq!(publisher.lookup("no-such-id").unwrap(), None);
}

#[test]
fn test_default_providers_produce_html_and_random_ids() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(PageStore::open_path(temp_dir.path()).unwrap());
    let publisher = Publisher::new(store);

    let first = publisher.create(PageDraft::new("Same", "# Heading")).unwrap();
    let second = publisher.create(PageDraft::new("Same", "# Heading")).unwrap();

    assert!(first.html.contains("<h1>Heading</h1>"));
    assert_ne!(first.id, second.id);
    assert_ne!(first.name, second.name);
    assert!(first.id.chars().all(|c| c.is_ascii_alphanumeric()));
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_preserves_identity_and_advances_updated_at() {
    let (_temp, publisher) = setup_publisher();
    let created = publisher.create(draft("Original")).unwrap();

    let updated = publisher
        .update(
            &created.id,
            &created.name,
            PageDraft::new("Renamed Title", "new body").github("other-repo"),
        )
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, created.name);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.title, "Renamed Title");
    assert_eq!(updated.html, "<rendered>new body</rendered>");
    assert_eq!(updated.twitter, None);
    assert_eq!(updated.github.as_deref(), Some("other-repo"));
    assert_eq!(publisher.view(&created.name).unwrap(), Some(updated.clone()));
    assert_eq!(publisher.lookup(&created.id).unwrap(), Some(updated));
}

#[test]
fn test_update_advances_even_with_frozen_clock() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(PageStore::open_path(temp_dir.path()).unwrap());
    let publisher = Publisher::new(store).with_clock(Arc::new(FrozenClock));
    let created = publisher.create(draft("Frozen")).unwrap();

    let first = publisher.update(&created.id, &created.name, draft("Frozen")).unwrap();
    let second = publisher.update(&created.id, &created.name, draft("Frozen")).unwrap();

    assert!(first.updated_at > created.updated_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.created_at, created.created_at);
}

#[test]
fn test_update_with_wrong_id_is_denied_and_changes_nothing() {
    let (_temp, publisher) = setup_publisher();
    let created = publisher.create(draft("Mine")).unwrap();
    let other = publisher.create(draft("Theirs")).unwrap();

    let result = publisher.update(&other.id, &created.name, draft("Hijacked"));

    assert!(matches!(result, Err(PublishError::PermissionDenied)));
    assert_eq!(result.unwrap_err().to_string(), "Permission denied.");
    assert_eq!(publisher.view(&created.name).unwrap(), Some(created));
}

#[test]
fn test_update_of_unknown_name_is_not_found() {
    let (_temp, publisher) = setup_publisher();

    let result = publisher.update("some-id", "ghost-page", draft("Anything"));

    match result {
        Err(PublishError::NotFound(message)) => {
            assert_eq!(message, "This page name does not exist.")
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert_eq!(page_count(&publisher), 0);
}

#[test]
fn test_permission_checked_before_validation() {
    let (_temp, publisher) = setup_publisher();
    let created = publisher.create(draft("Mine")).unwrap();

    let result = publisher.update("wrong-id", &created.name, PageDraft::new("!!!", ""));

    assert!(matches!(result, Err(PublishError::PermissionDenied)));
}

#[test]
fn test_invalid_update_leaves_record_unchanged() {
    let (_temp, publisher) = setup_publisher();
    let created = publisher.create(draft("Stable")).unwrap();

    let result = publisher.update(
        &created.id,
        &created.name,
        draft("Stable").website("not a url"),
    );

    assert_validation(result, "website", "Invalid website URL");
    assert_eq!(publisher.view(&created.name).unwrap(), Some(created));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_titles_without_sluggable_characters_are_rejected() {
    let (_temp, publisher) = setup_publisher();

    for title in ["", "   ", "!!!", "—?¿"] {
        assert_validation(publisher.create(draft(title)), "title", "Provide a title");
    }
    assert_eq!(page_count(&publisher), 0);
}

#[test]
fn test_invalid_website_is_rejected() {
    let (_temp, publisher) = setup_publisher();

    for website in ["example.com", "not a url", "/relative/path"] {
        assert_validation(
            publisher.create(draft("Site").website(website)),
            "website",
            "Invalid website URL",
        );
    }
}

#[test]
fn test_handle_errors_name_their_platform() {
    let (_temp, publisher) = setup_publisher();

    assert_validation(
        publisher.create(draft("T").twitter("john doe")),
        "twitter",
        "Invalid Twitter Handle. Only letters, numbers, and underscore allowed.",
    );
    assert_validation(
        publisher.create(draft("G").github("my.repo")),
        "github",
        "Invalid GitHub Handle. Only letters, numbers, and dash allowed.",
    );
    assert_validation(
        publisher.create(draft("F").facebook("john_doe")),
        "facebook",
        "Invalid Facebook Handle. Only letters, numbers, and dot allowed.",
    );
    assert_validation(
        publisher.create(draft("I").instagram("john.doe")),
        "instagram",
        "Invalid Instagram Handle. Only letters and numbers allowed.",
    );
    assert_eq!(page_count(&publisher), 0);
}

#[test]
fn test_first_failing_field_wins() {
    let (_temp, publisher) = setup_publisher();

    let everything_wrong = PageDraft::new("!!!", "")
        .website("nope")
        .twitter("bad handle")
        .instagram("bad.handle");
    assert_validation(publisher.create(everything_wrong), "title", "Provide a title");

    let handles_wrong = PageDraft::new("Fine", "")
        .github("bad handle")
        .twitter("bad handle");
    assert_validation(
        publisher.create(handles_wrong),
        "twitter",
        "Invalid Twitter Handle. Only letters, numbers, and underscore allowed.",
    );
}

#[test]
fn test_digits_in_handles_follow_charset() {
    let (_temp, publisher) = setup_publisher();
    assert!(publisher.create(draft("Digits").twitter("user2024")).is_ok());

    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(PageStore::open_path(temp_dir.path()).unwrap());
    let strict = Publisher::new(store).with_config(PublishConfig {
        handle_charset: HandleCharset::LettersOnly,
        ..PublishConfig::default()
    });

    assert_validation(
        strict.create(draft("Digits").twitter("user2024")),
        "twitter",
        "Invalid Twitter Handle. Only letters, numbers, and underscore allowed.",
    );
    assert!(strict.create(draft("Letters").twitter("user_name")).is_ok());
}

#[test]
fn test_custom_slugifier_is_used() {
    fn shout(title: &str) -> String {
        title.to_uppercase().replace(' ', "_")
    }

    let (_temp, publisher) = setup_publisher();
    let publisher = publisher.with_slugifier(shout);

    let page = publisher.create(draft("big news")).unwrap();
    assert!(page.name.starts_with("BIG_NEWS-"));
}

// =============================================================================
// Sitemap
// =============================================================================

#[test]
fn test_sitemap_lists_root_then_pages_in_name_order() {
    let (_temp, publisher) = setup_publisher();
    let zebra = publisher.create(draft("Zebra")).unwrap();
    let apple = publisher.create(draft("Apple")).unwrap();
    let mango = publisher.create(draft("Mango")).unwrap();

    let sitemap = publisher.sitemap("https://publish.example/").unwrap();

    assert_eq!(
        sitemap,
        format!(
            "https://publish.example/\n\
             https://publish.example/{}\n\
             https://publish.example/{}\n\
             https://publish.example/{}\n",
            apple.name, mango.name, zebra.name
        )
    );
}

#[test]
fn test_sitemap_of_empty_store() {
    let (_temp, publisher) = setup_publisher();
    assert_eq!(publisher.sitemap("http://localhost").unwrap(), "http://localhost/\n");
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_creates_never_collide() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(PageStore::open_path(temp_dir.path()).unwrap());
    let publisher = Publisher::new(store);
    let created = Mutex::new(Vec::new());

    thread::scope(|s| {
        for t in 0..4 {
            let publisher = &publisher;
            let created = &created;
            s.spawn(move || {
                for i in 0..25 {
                    let page = publisher
                        .create(draft(&format!("Thread {} page {}", t, i)))
                        .unwrap();
                    created.lock().unwrap().push(page);
                }
            });
        }
    });

    let created = created.into_inner().unwrap();
    let ids: HashSet<_> = created.iter().map(|p| p.id.clone()).collect();
    let names: HashSet<_> = created.iter().map(|p| p.name.clone()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(names.len(), 100);
    assert_eq!(page_count(&publisher), 100);

    for page in &created {
        assert_eq!(publisher.lookup(&page.id).unwrap().as_ref(), Some(page));
    }
}
