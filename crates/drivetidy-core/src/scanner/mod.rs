/// Scanner module: turns a scope into an `ItemStore`, from cache or remote.
///
/// Each invocation runs a small state machine:
/// - **CheckCache:** serve the cached snapshot when it exists, is fresh (or
///   the caller allowed stale data) and rebuilds cleanly.
/// - **Fetch:** drive the paginated remote listing to completion, build the
///   store, and save it unless caching is disabled.
/// - **Serve:** hand the store back behind an `Arc`.
///
/// Remote failures come back unchanged inside [`ScanError::Listing`]; the
/// coordinator never retries and never falls back to a stale snapshot on
/// its own.
///
/// [`start_scan`] runs the same machine on a background thread with a
/// progress channel and a cancel flag that is checked between pages.
pub mod listing;
pub mod progress;

use crate::cache::{SnapshotCache, DEFAULT_TTL_HOURS};
use crate::error::{ScanError, ScanStage};
use crate::model::{Item, ItemStore, ScopeId};
pub use listing::{ListingPage, RemoteListing};
pub use progress::{FetchReason, ScanProgress};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maximum number of progress messages that may queue up in the channel.
///
/// Progress is best-effort: when the receiver falls this far behind, page
/// updates are dropped instead of stalling the fetch.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Caller overrides for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Skip the cache entirely: never read, never write.
    pub no_cache: bool,
    /// Ignore any cached entry but still save the fresh result.
    pub force_refresh: bool,
    /// Serve a cached entry even when it is past its TTL.
    pub allow_stale: bool,
    /// TTL recorded with a freshly fetched snapshot.
    pub ttl_hours: f64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            no_cache: false,
            force_refresh: false,
            allow_stale: false,
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

/// Where a served store came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotOrigin {
    Cache {
        captured_at: DateTime<Utc>,
        /// Past its TTL, served only because the caller allowed it.
        stale: bool,
    },
    Fresh {
        captured_at: DateTime<Utc>,
        pages: u64,
    },
}

impl SnapshotOrigin {
    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            Self::Cache { captured_at, .. } | Self::Fresh { captured_at, .. } => *captured_at,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }
}

/// Result of the Serve state.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub store: Arc<ItemStore>,
    pub origin: SnapshotOrigin,
}

enum CacheDecision {
    Serve(ScanOutcome),
    Fetch(FetchReason),
}

/// Drives CheckCache → Fetch → Serve for one scope at a time.
pub struct ScanCoordinator {
    listing: Arc<dyn RemoteListing>,
    cache: SnapshotCache,
}

impl ScanCoordinator {
    pub fn new(listing: Arc<dyn RemoteListing>, cache: SnapshotCache) -> Self {
        Self { listing, cache }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Run the state machine synchronously on the calling thread.
    pub fn scan(&self, scope: &ScopeId, options: &ScanOptions) -> Result<ScanOutcome, ScanError> {
        let never = AtomicBool::new(false);
        self.scan_with(scope, options, None, &never)
    }

    fn scan_with(
        &self,
        scope: &ScopeId,
        options: &ScanOptions,
        progress: Option<&Sender<ScanProgress>>,
        cancel: &AtomicBool,
    ) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();

        let reason = match self.check_cache(scope, options, progress) {
            CacheDecision::Serve(outcome) => {
                emit(
                    progress,
                    ScanProgress::Complete {
                        duration: start.elapsed(),
                        item_count: outcome.store.len(),
                        from_cache: true,
                    },
                );
                return Ok(outcome);
            }
            CacheDecision::Fetch(reason) => reason,
        };

        info!(
            "Fetching scope {scope} from {} ({reason})",
            self.listing.identifier()
        );
        emit(
            progress,
            ScanProgress::FetchStarted {
                scope: scope.clone(),
                reason,
            },
        );

        let (items, pages) = self.fetch(scope, progress, cancel)?;
        let captured_at = Utc::now();

        let store = ItemStore::build(scope.clone(), items).map_err(|source| ScanError::Tree {
            scope: scope.clone(),
            stage: ScanStage::Fetch,
            source,
        })?;

        if !options.no_cache {
            // A snapshot that cannot be cached is still a good snapshot.
            if let Err(e) = self
                .cache
                .save_at(scope, store.items(), options.ttl_hours, captured_at)
            {
                warn!("Failed to cache scope {scope}: {e}");
            }
        }

        let duration = start.elapsed();
        info!(
            "Fetched {} items for scope {scope} in {:.2}s ({pages} page(s))",
            store.len(),
            duration.as_secs_f64()
        );
        emit(
            progress,
            ScanProgress::Complete {
                duration,
                item_count: store.len(),
                from_cache: false,
            },
        );

        Ok(ScanOutcome {
            store: Arc::new(store),
            origin: SnapshotOrigin::Fresh { captured_at, pages },
        })
    }

    fn check_cache(
        &self,
        scope: &ScopeId,
        options: &ScanOptions,
        progress: Option<&Sender<ScanProgress>>,
    ) -> CacheDecision {
        if options.no_cache {
            return CacheDecision::Fetch(FetchReason::NoCache);
        }
        if options.force_refresh {
            return CacheDecision::Fetch(FetchReason::ForceRefresh);
        }

        let Some(entry) = self.cache.load(scope) else {
            return CacheDecision::Fetch(FetchReason::Absent);
        };

        let now = Utc::now();
        let stale = !entry.is_fresh(now);
        if stale && !options.allow_stale {
            info!(
                "Cached snapshot for scope {scope} expired {:.1}h ago",
                -entry.expires_in_hours(now)
            );
            return CacheDecision::Fetch(FetchReason::Stale);
        }

        let captured_at = entry.captured_at;
        match entry.into_store() {
            Ok(store) => {
                if stale {
                    warn!("Serving stale snapshot for scope {scope} captured at {captured_at}");
                } else {
                    info!("Serving cached snapshot for scope {scope} captured at {captured_at}");
                }
                emit(
                    progress,
                    ScanProgress::CacheHit {
                        scope: scope.clone(),
                        captured_at,
                        item_count: store.len(),
                        stale,
                    },
                );
                CacheDecision::Serve(ScanOutcome {
                    store: Arc::new(store),
                    origin: SnapshotOrigin::Cache { captured_at, stale },
                })
            }
            Err(e) => {
                warn!("Cached snapshot for scope {scope} is unusable: {e}");
                CacheDecision::Fetch(FetchReason::Corrupt)
            }
        }
    }

    /// Pull every page. The cancel flag is checked before each request and
    /// once more after the last one.
    fn fetch(
        &self,
        scope: &ScopeId,
        progress: Option<&Sender<ScanProgress>>,
        cancel: &AtomicBool,
    ) -> Result<(Vec<Item>, u64), ScanError> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        let mut pages: u64 = 0;

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(cancelled(scope, progress, pages));
            }

            let ListingPage {
                items: batch,
                next_page_token,
            } = self
                .listing
                .list_page(scope, token.as_deref())
                .map_err(|source| ScanError::Listing {
                    scope: scope.clone(),
                    stage: ScanStage::Fetch,
                    source,
                })?;

            pages += 1;
            items.extend(batch);
            debug!("Scope {scope}: page {pages}, {} items so far", items.len());
            emit(
                progress,
                ScanProgress::Page {
                    pages,
                    items_found: items.len() as u64,
                },
            );

            match next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        // A cancel raised while the last page was in flight still wins.
        if cancel.load(Ordering::Relaxed) {
            return Err(cancelled(scope, progress, pages));
        }

        Ok((items, pages))
    }
}

fn cancelled(scope: &ScopeId, progress: Option<&Sender<ScanProgress>>, pages: u64) -> ScanError {
    info!("Fetch of scope {scope} cancelled after {pages} page(s)");
    emit(progress, ScanProgress::Cancelled { pages });
    ScanError::Cancelled {
        scope: scope.clone(),
        pages,
    }
}

fn emit(progress: Option<&Sender<ScanProgress>>, message: ScanProgress) {
    if let Some(tx) = progress {
        let _ = tx.try_send(message);
    }
}

/// Handle to a running or completed background scan.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,
    scope: ScopeId,
    cancel_flag: Arc<AtomicBool>,
    thread: thread::JoinHandle<Result<ScanOutcome, ScanError>>,
}

impl ScanHandle {
    /// Request the fetch to stop before its next page.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Shared cancel flag, for callers that cancel from another thread
    /// (an interrupt handler, for one).
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Block until the scan thread finishes and return its result.
    pub fn wait(self) -> Result<ScanOutcome, ScanError> {
        let scope = self.scope;
        self.thread
            .join()
            .unwrap_or_else(|_| Err(ScanError::Panicked { scope }))
    }
}

/// Start a scan of `scope` on a background thread.
///
/// Returns a `ScanHandle` for receiving progress, requesting cancellation
/// and collecting the result.
pub fn start_scan(
    coordinator: Arc<ScanCoordinator>,
    scope: ScopeId,
    options: ScanOptions,
) -> Result<ScanHandle, ScanError> {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();
    let thread_scope = scope.clone();

    let thread = thread::Builder::new()
        .name("drivetidy-scanner".into())
        .spawn(move || {
            info!("Starting scan of scope {thread_scope}");
            coordinator.scan_with(&thread_scope, &options, Some(&progress_tx), &cancel_clone)
        })
        .map_err(|source| ScanError::Spawn {
            scope: scope.clone(),
            source,
        })?;

    Ok(ScanHandle {
        progress_rx,
        scope,
        cancel_flag,
        thread,
    })
}
