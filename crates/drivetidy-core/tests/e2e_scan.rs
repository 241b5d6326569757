/// End-to-end tests for the cache-or-fetch pipeline.
///
/// These drive a real `ScanCoordinator` over a real on-disk cache in a
/// temporary directory, with a scripted in-process listing standing in for
/// the remote API. Every path through CheckCache → Fetch → Serve is covered,
/// along with the background `start_scan` handle.
use chrono::{TimeDelta, Utc};
use crossbeam_channel::{Receiver, Sender};
use drivetidy_core::cache::backend::{DirBackend, SnapshotBackend};
use drivetidy_core::cache::{scope_key, CacheState, SnapshotCache};
use drivetidy_core::error::{ListingError, ScanError, ScanStage, StoreError};
use drivetidy_core::model::{Item, ItemStore, ScopeId};
use drivetidy_core::scanner::{
    start_scan, FetchReason, ListingPage, RemoteListing, ScanCoordinator, ScanOptions,
    ScanProgress, SnapshotOrigin,
};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Serves scripted pages in order. Page tokens are the next page index.
struct ScriptedListing {
    pages: Vec<Result<Vec<Item>, ListingError>>,
    calls: Mutex<usize>,
}

impl ScriptedListing {
    fn new(pages: Vec<Result<Vec<Item>, ListingError>>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: Mutex::new(0),
        })
    }

    fn ok(pages: Vec<Vec<Item>>) -> Arc<Self> {
        Self::new(pages.into_iter().map(Ok).collect())
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl RemoteListing for ScriptedListing {
    fn list_page(
        &self,
        _scope: &ScopeId,
        page_token: Option<&str>,
    ) -> Result<ListingPage, ListingError> {
        *self.calls.lock() += 1;
        let index: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let items = self.pages.get(index).cloned().unwrap_or(Ok(Vec::new()))?;
        let next = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(ListingPage {
            items,
            next_page_token: next,
        })
    }

    fn identifier(&self) -> String {
        "scripted".into()
    }
}

/// Holds the first page until the test releases it, so cancellation can be
/// requested while a fetch is provably in flight.
struct GatedListing {
    gate: Receiver<()>,
    calls: Mutex<usize>,
}

impl RemoteListing for GatedListing {
    fn list_page(
        &self,
        _scope: &ScopeId,
        page_token: Option<&str>,
    ) -> Result<ListingPage, ListingError> {
        *self.calls.lock() += 1;
        let _ = self.gate.recv_timeout(Duration::from_secs(30));
        let index: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        Ok(ListingPage {
            items: vec![Item::file(format!("f{index}"), format!("file{index}.txt"), 10, None)],
            next_page_token: Some((index + 1).to_string()),
        })
    }

    fn identifier(&self) -> String {
        "gated".into()
    }
}

/// ```text
/// Projects/
///   alpha/
///     notes.md   (100 bytes)
///   logo.png     (300 bytes)
/// readme.txt     (400 bytes)
/// ```
fn sample_pages() -> Vec<Vec<Item>> {
    vec![
        vec![
            Item::folder("p", "Projects", None),
            Item::folder("a", "alpha", Some("p")),
        ],
        vec![
            Item::file("n", "notes.md", 100, Some("a")),
            Item::file("l", "logo.png", 300, Some("p")),
        ],
        vec![Item::file("r", "readme.txt", 400, None)],
    ]
}

fn all_items() -> Vec<Item> {
    sample_pages().into_iter().flatten().collect()
}

fn coordinator(listing: Arc<dyn RemoteListing>, dir: &TempDir) -> ScanCoordinator {
    ScanCoordinator::new(listing, SnapshotCache::in_dir(dir.path()).unwrap())
}

fn scope() -> ScopeId {
    ScopeId::entire_drive()
}

// ── Cache-or-fetch ───────────────────────────────────────────────────────────

#[test]
fn first_scan_fetches_every_page_and_caches() {
    let tmp = TempDir::new().unwrap();
    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);

    let outcome = coord.scan(&scope(), &ScanOptions::default()).unwrap();

    assert_eq!(listing.calls(), 3);
    assert!(matches!(outcome.origin, SnapshotOrigin::Fresh { pages: 3, .. }));
    assert_eq!(outcome.store.len(), 5);
    assert_eq!(outcome.store.total_file_bytes(), 800);

    let status = coord.cache().status(&scope());
    assert_eq!(status.state, CacheState::Valid);
    assert_eq!(status.item_count, 5);
}

#[test]
fn second_scan_is_served_from_cache() {
    let tmp = TempDir::new().unwrap();
    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);

    let first = coord.scan(&scope(), &ScanOptions::default()).unwrap();
    let second = coord.scan(&scope(), &ScanOptions::default()).unwrap();

    assert_eq!(listing.calls(), 3, "cache hit must not touch the listing");
    assert!(second.origin.is_cached());
    assert_eq!(second.store.items(), first.store.items());
}

#[test]
fn cache_survives_a_new_coordinator() {
    let tmp = TempDir::new().unwrap();
    coordinator(ScriptedListing::ok(sample_pages()), &tmp)
        .scan(&scope(), &ScanOptions::default())
        .unwrap();

    let listing = ScriptedListing::ok(Vec::new());
    let outcome = coordinator(listing.clone(), &tmp)
        .scan(&scope(), &ScanOptions::default())
        .unwrap();

    assert_eq!(listing.calls(), 0);
    assert_eq!(outcome.store.len(), 5);
}

#[test]
fn stale_entry_is_refetched_unless_stale_is_allowed() {
    let tmp = TempDir::new().unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    cache
        .save_at(
            &scope(),
            &[Item::file("old", "old.txt", 1, None)],
            2.0,
            Utc::now() - TimeDelta::hours(3),
        )
        .unwrap();

    let allow = ScanOptions {
        allow_stale: true,
        ..ScanOptions::default()
    };
    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);

    let served = coord.scan(&scope(), &allow).unwrap();
    assert_eq!(listing.calls(), 0);
    assert!(matches!(served.origin, SnapshotOrigin::Cache { stale: true, .. }));
    assert_eq!(served.store.len(), 1);

    let refreshed = coord.scan(&scope(), &ScanOptions::default()).unwrap();
    assert_eq!(listing.calls(), 3);
    assert!(!refreshed.origin.is_cached());
    assert_eq!(refreshed.store.len(), 5);
    assert_eq!(coord.cache().status(&scope()).state, CacheState::Valid);
}

#[test]
fn force_refresh_bypasses_a_fresh_entry_but_still_saves() {
    let tmp = TempDir::new().unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    cache
        .save(&scope(), &[Item::file("old", "old.txt", 1, None)], 24.0)
        .unwrap();

    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);
    let options = ScanOptions {
        force_refresh: true,
        ..ScanOptions::default()
    };

    let outcome = coord.scan(&scope(), &options).unwrap();

    assert_eq!(listing.calls(), 3);
    assert_eq!(outcome.store.len(), 5);
    assert_eq!(coord.cache().load(&scope()).unwrap().items, all_items());
}

#[test]
fn no_cache_never_reads_or_writes() {
    let tmp = TempDir::new().unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    cache
        .save(&scope(), &[Item::file("old", "old.txt", 1, None)], 24.0)
        .unwrap();

    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);
    let options = ScanOptions {
        no_cache: true,
        ..ScanOptions::default()
    };

    let outcome = coord.scan(&scope(), &options).unwrap();

    assert_eq!(listing.calls(), 3);
    assert_eq!(outcome.store.len(), 5);
    let cached = coord.cache().load(&scope()).unwrap();
    assert_eq!(cached.items.len(), 1, "existing entry must be untouched");
}

#[test]
fn ttl_option_is_recorded_with_the_snapshot() {
    let tmp = TempDir::new().unwrap();
    let coord = coordinator(ScriptedListing::ok(sample_pages()), &tmp);
    let options = ScanOptions {
        ttl_hours: 6.0,
        ..ScanOptions::default()
    };

    coord.scan(&scope(), &options).unwrap();

    assert_eq!(coord.cache().load(&scope()).unwrap().ttl_hours, 6.0);
}

#[test]
fn scopes_are_cached_independently() {
    let tmp = TempDir::new().unwrap();
    let listing = ScriptedListing::ok(vec![vec![Item::file("x", "x.txt", 5, Some("folder-1"))]]);
    let coord = coordinator(listing.clone(), &tmp);
    let subtree = ScopeId::new("folder-1");

    coord.scan(&subtree, &ScanOptions::default()).unwrap();
    assert_eq!(coord.cache().status(&subtree).state, CacheState::Valid);
    assert_eq!(coord.cache().status(&scope()).state, CacheState::Absent);

    coord.cache().clear(&subtree).unwrap();
    assert_eq!(coord.cache().status(&subtree).state, CacheState::Absent);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn listing_errors_pass_through_unchanged() {
    let tmp = TempDir::new().unwrap();
    let quota = ListingError::QuotaExceeded {
        message: "daily limit".into(),
    };
    let listing = ScriptedListing::new(vec![Ok(sample_pages()[0].clone()), Err(quota.clone())]);
    let coord = coordinator(listing, &tmp);

    let err = coord.scan(&scope(), &ScanOptions::default()).unwrap_err();

    assert_eq!(err.listing_error(), Some(&quota));
    assert_eq!(err.scope(), &scope());
    assert_eq!(err.stage(), Some(ScanStage::Fetch));
    assert_eq!(coord.cache().status(&scope()).state, CacheState::Absent);
}

#[test]
fn listing_error_does_not_fall_back_to_a_stale_entry() {
    let tmp = TempDir::new().unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    cache
        .save_at(
            &scope(),
            &all_items(),
            1.0,
            Utc::now() - TimeDelta::hours(5),
        )
        .unwrap();

    let listing = ScriptedListing::new(vec![Err(ListingError::RemoteUnavailable {
        message: "offline".into(),
    })]);
    let coord = coordinator(listing, &tmp);

    let err = coord.scan(&scope(), &ScanOptions::default()).unwrap_err();

    assert!(matches!(
        err.listing_error(),
        Some(ListingError::RemoteUnavailable { .. })
    ));
    assert_eq!(coord.cache().status(&scope()).state, CacheState::Stale);
}

#[test]
fn malformed_fresh_fetch_is_fatal_and_not_cached() {
    let tmp = TempDir::new().unwrap();
    let listing = ScriptedListing::ok(vec![vec![
        Item::folder("a", "A", Some("b")),
        Item::folder("b", "B", Some("a")),
    ]]);
    let coord = coordinator(listing, &tmp);

    let err = coord.scan(&scope(), &ScanOptions::default()).unwrap_err();

    match &err {
        ScanError::Tree { stage, source, .. } => {
            assert_eq!(*stage, ScanStage::Fetch);
            assert!(matches!(source, StoreError::MalformedTree { .. }));
        }
        other => panic!("expected a tree error, got {other}"),
    }
    assert!(err.to_string().contains("root"), "{err}");
    assert_eq!(coord.cache().status(&scope()).state, CacheState::Absent);
}

#[test]
fn unparseable_cache_file_is_treated_as_absent() {
    let tmp = TempDir::new().unwrap();
    let backend = DirBackend::new(tmp.path()).unwrap();
    fs::write(backend.record_path(&scope_key(&scope())), b"{\"format_version\": 1, \"items\": [").unwrap();

    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);

    let outcome = coord.scan(&scope(), &ScanOptions::default()).unwrap();

    assert_eq!(listing.calls(), 3);
    assert_eq!(outcome.store.len(), 5);
    assert_eq!(coord.cache().load(&scope()).unwrap().items, all_items());
}

#[test]
fn cached_entry_that_cannot_rebuild_triggers_a_refetch() {
    let tmp = TempDir::new().unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    // Parses fine but names a parent that is not in the snapshot.
    cache
        .save(&scope(), &[Item::file("x", "x.txt", 1, Some("ghost"))], 24.0)
        .unwrap();

    let listing = ScriptedListing::ok(sample_pages());
    let coord = coordinator(listing.clone(), &tmp);
    let handle = start_scan(Arc::new(coord), scope(), ScanOptions::default()).unwrap();
    let (outcome, messages) = handle_result(handle);

    assert_eq!(listing.calls(), 3);
    assert_eq!(outcome.store.len(), 5);
    assert!(messages.iter().any(|m| matches!(
        m,
        ScanProgress::FetchStarted {
            reason: FetchReason::Corrupt,
            ..
        }
    )));
}

#[test]
fn interrupted_write_leaves_previous_entry_readable() {
    let tmp = TempDir::new().unwrap();
    let backend = DirBackend::new(tmp.path()).unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    cache.save(&scope(), &all_items(), 2.0).unwrap();

    // A crash between writing the staging file and renaming it.
    let key = scope_key(&scope());
    fs::write(backend.temp_path(&key), b"{\"format_version\": 1, \"sco").unwrap();

    let entry = cache.load(&scope()).unwrap();
    assert_eq!(entry.items, all_items());

    cache.clear(&scope()).unwrap();
    assert!(!backend.temp_path(&key).exists());
    assert!(backend.read(&key).unwrap().is_none());
}

// ── Background scans ─────────────────────────────────────────────────────────

/// Wait for a background scan and collect every progress message it sent.
fn handle_result(
    handle: drivetidy_core::scanner::ScanHandle,
) -> (drivetidy_core::ScanOutcome, Vec<ScanProgress>) {
    let rx = handle.progress_rx.clone();
    let outcome = handle.wait().unwrap();
    (outcome, rx.try_iter().collect())
}

#[test]
fn background_scan_reports_pages_then_completion() {
    let tmp = TempDir::new().unwrap();
    let coord = Arc::new(coordinator(ScriptedListing::ok(sample_pages()), &tmp));

    let handle = start_scan(coord, scope(), ScanOptions::default()).unwrap();
    assert_eq!(handle.scope(), &scope());
    let (outcome, messages) = handle_result(handle);

    assert_eq!(outcome.store.len(), 5);
    assert_eq!(
        messages.first(),
        Some(&ScanProgress::FetchStarted {
            scope: scope(),
            reason: FetchReason::Absent,
        })
    );
    let pages: Vec<u64> = messages
        .iter()
        .filter_map(|m| match m {
            ScanProgress::Page { pages, .. } => Some(*pages),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![1, 2, 3]);
    assert!(matches!(
        messages.last(),
        Some(ScanProgress::Complete {
            item_count: 5,
            from_cache: false,
            ..
        })
    ));
}

#[test]
fn background_cache_hit_reports_without_fetching() {
    let tmp = TempDir::new().unwrap();
    let cache = SnapshotCache::in_dir(tmp.path()).unwrap();
    cache.save(&scope(), &all_items(), 2.0).unwrap();

    let listing = ScriptedListing::ok(Vec::new());
    let coord = Arc::new(coordinator(listing.clone(), &tmp));
    let (outcome, messages) =
        handle_result(start_scan(coord, scope(), ScanOptions::default()).unwrap());

    assert_eq!(listing.calls(), 0);
    assert!(outcome.origin.is_cached());
    assert!(matches!(
        messages.as_slice(),
        [
            ScanProgress::CacheHit {
                item_count: 5,
                stale: false,
                ..
            },
            ScanProgress::Complete {
                from_cache: true,
                ..
            }
        ]
    ));
}

#[test]
fn cancelling_between_pages_stops_the_fetch_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let (release, gate): (Sender<()>, Receiver<()>) = crossbeam_channel::unbounded();
    let listing = Arc::new(GatedListing {
        gate,
        calls: Mutex::new(0),
    });
    let coord = Arc::new(coordinator(listing.clone(), &tmp));

    let handle = start_scan(coord.clone(), scope(), ScanOptions::default()).unwrap();
    handle.cancel();
    assert!(handle.is_cancelled());
    release.send(()).unwrap();

    let rx = handle.progress_rx.clone();
    let err = handle.wait().unwrap_err();

    assert!(matches!(err, ScanError::Cancelled { .. }), "{err}");
    assert!(*listing.calls.lock() <= 1);
    assert!(rx
        .try_iter()
        .any(|m| matches!(m, ScanProgress::Cancelled { .. })));
    assert_eq!(coord.cache().status(&scope()).state, CacheState::Absent);
}

#[test]
fn restored_snapshot_matches_a_direct_build() {
    let tmp = TempDir::new().unwrap();
    let coord = coordinator(ScriptedListing::ok(sample_pages()), &tmp);
    coord.scan(&scope(), &ScanOptions::default()).unwrap();

    let cached = coord.scan(&scope(), &ScanOptions::default()).unwrap();
    let direct = ItemStore::build(scope(), all_items()).unwrap();

    for item in direct.iter() {
        assert_eq!(
            cached.store.display_path(&item.id).unwrap(),
            direct.display_path(&item.id).unwrap()
        );
    }
    assert_eq!(
        cached
            .store
            .display_path(&drivetidy_core::ItemId::new("n"))
            .unwrap(),
        "Projects/alpha/notes.md"
    );
}
