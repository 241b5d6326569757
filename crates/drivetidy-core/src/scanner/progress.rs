/// Scan progress reporting: lightweight messages sent from the scan
/// thread to the caller via a crossbeam channel.
use crate::model::ScopeId;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Why the coordinator went to the remote listing instead of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// Caching disabled for this invocation.
    NoCache,
    /// Nothing cached for the scope.
    Absent,
    ForceRefresh,
    /// Cached entry past its TTL.
    Stale,
    /// Cached entry loaded but could not be rebuilt into a store.
    Corrupt,
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoCache => "cache disabled",
            Self::Absent => "no cached snapshot",
            Self::ForceRefresh => "forced refresh",
            Self::Stale => "cached snapshot is stale",
            Self::Corrupt => "cached snapshot is unusable",
        };
        f.write_str(label)
    }
}

/// Progress updates sent from the scan thread.
///
/// The finished store is returned by `ScanHandle::wait`; these messages
/// carry only counters and status.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanProgress {
    /// Serving a cached snapshot; no fetch will happen.
    CacheHit {
        scope: ScopeId,
        captured_at: DateTime<Utc>,
        item_count: usize,
        /// Served past its TTL because the caller allowed it.
        stale: bool,
    },
    /// Going to the remote listing.
    FetchStarted { scope: ScopeId, reason: FetchReason },
    /// One more page received.
    Page { pages: u64, items_found: u64 },
    /// Scan finished and a store is ready.
    Complete {
        duration: Duration,
        item_count: usize,
        from_cache: bool,
    },
    /// Fetch abandoned between pages. Nothing was cached.
    Cancelled { pages: u64 },
}
