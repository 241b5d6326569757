/// Snapshot cache: one persisted tree listing per scope, with a wall-clock TTL.
///
/// The cache is a quota-saving layer over an expensive remote listing.
/// Freshness is judged purely by `captured_at + ttl_hours`; there is no
/// content hashing because the remote side offers no cheap change feed.
///
/// Only the flat `Item` records are persisted. Derived indices are rebuilt
/// by [`ItemStore::build`] on load, so the on-disk format does not depend
/// on how the store indexes itself.
///
/// Any record that fails to read, parse or validate is logged and treated
/// as absent. `load` never fails.
pub mod backend;

use crate::error::{CacheError, StoreError};
use crate::model::{Item, ItemStore, ScopeId};
use backend::{DirBackend, MemoryBackend, SnapshotBackend};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Bumped whenever the persisted record layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// TTL used when the caller does not pick one.
pub const DEFAULT_TTL_HOURS: f64 = 2.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// A loaded snapshot for one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub scope: ScopeId,
    pub captured_at: DateTime<Utc>,
    pub ttl_hours: f64,
    pub items: Vec<Item>,
}

impl CacheEntry {
    /// The instant after which the entry is stale.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl_ms = (self.ttl_hours * MILLIS_PER_HOUR).round();
        TimeDelta::try_milliseconds(ttl_ms as i64)
            .and_then(|ttl| self.captured_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// `now < captured_at + ttl_hours`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.captured_at, now)
    }

    /// Hours until expiry; negative once stale.
    pub fn expires_in_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(now, self.expires_at())
    }

    /// Rebuild the indexed store from the persisted records.
    pub fn into_store(self) -> Result<ItemStore, StoreError> {
        ItemStore::build(self.scope, self.items)
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// On-disk shape of a cache entry.
#[derive(Debug, Deserialize)]
struct CacheRecord {
    format_version: u32,
    scope_id: ScopeId,
    captured_at: DateTime<Utc>,
    ttl_hours: f64,
    item_count: usize,
    items: Vec<Item>,
}

/// Borrowing twin of [`CacheRecord`] so saving does not clone the items.
#[derive(Serialize)]
struct CacheRecordRef<'a> {
    format_version: u32,
    scope_id: &'a ScopeId,
    captured_at: DateTime<Utc>,
    ttl_hours: f64,
    item_count: usize,
    items: &'a [Item],
}

/// Freshness of a scope's cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheState {
    Valid,
    Stale,
    Absent,
}

/// Inspection result that never triggers a fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub scope: ScopeId,
    pub state: CacheState,
    pub item_count: usize,
    pub age_hours: f64,
    pub expires_in_hours: f64,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Backend key for a scope.
///
/// Scope ids are provider-chosen strings, so they are hashed into a
/// filesystem-safe name.
pub fn scope_key(scope: &ScopeId) -> String {
    let digest = Sha256::digest(scope.as_str().as_bytes());
    format!("{digest:x}")
}

/// Per-scope snapshot persistence over an injected backend.
pub struct SnapshotCache {
    backend: Box<dyn SnapshotBackend>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("backend", &self.backend.describe())
            .finish()
    }
}

impl SnapshotCache {
    pub fn new(backend: impl SnapshotBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Cache stored as JSON files inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Ok(Self::new(DirBackend::new(dir)?))
    }

    /// Cache that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Where entries are stored, for logs.
    pub fn location(&self) -> String {
        self.backend.describe()
    }

    /// `now < entry.captured_at + entry.ttl_hours`.
    pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry.is_fresh(now)
    }

    /// Load the entry for `scope`, fresh or stale.
    ///
    /// Missing, unreadable and invalid records all come back as `None`;
    /// the latter two are logged.
    pub fn load(&self, scope: &ScopeId) -> Option<CacheEntry> {
        match self.try_load(scope) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Ignoring cache entry for scope {scope}: {err}");
                None
            }
        }
    }

    /// Strict variant of [`load`](Self::load) that reports why a record
    /// was rejected.
    pub fn try_load(&self, scope: &ScopeId) -> Result<Option<CacheEntry>, CacheError> {
        let Some(bytes) = self.backend.read(&scope_key(scope))? else {
            debug!("No cache entry for scope {scope}");
            return Ok(None);
        };

        let record: CacheRecord =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(scope, e.to_string()))?;

        if record.format_version != FORMAT_VERSION {
            return Err(corrupt(
                scope,
                format!("unsupported format version {}", record.format_version),
            ));
        }
        if record.scope_id != *scope {
            return Err(corrupt(
                scope,
                format!("record belongs to scope {}", record.scope_id),
            ));
        }
        if !record.ttl_hours.is_finite() || record.ttl_hours < 0.0 {
            return Err(corrupt(scope, format!("invalid ttl {}", record.ttl_hours)));
        }
        if record.item_count != record.items.len() {
            return Err(corrupt(
                scope,
                format!(
                    "header promises {} items but {} were stored",
                    record.item_count,
                    record.items.len()
                ),
            ));
        }

        Ok(Some(CacheEntry {
            scope: record.scope_id,
            captured_at: record.captured_at,
            ttl_hours: record.ttl_hours,
            items: record.items,
        }))
    }

    /// Replace the entry for `scope`, captured now.
    pub fn save(&self, scope: &ScopeId, items: &[Item], ttl_hours: f64) -> Result<(), CacheError> {
        self.save_at(scope, items, ttl_hours, Utc::now())
    }

    /// Replace the entry for `scope` with an explicit capture time.
    pub fn save_at(
        &self,
        scope: &ScopeId,
        items: &[Item],
        ttl_hours: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        if !ttl_hours.is_finite() || ttl_hours < 0.0 {
            return Err(CacheError::InvalidTtl { ttl_hours });
        }

        let record = CacheRecordRef {
            format_version: FORMAT_VERSION,
            scope_id: scope,
            captured_at,
            ttl_hours,
            item_count: items.len(),
            items,
        };
        let bytes = serde_json::to_vec(&record)?;
        self.backend.write_atomic(&scope_key(scope), &bytes)?;

        info!(
            "Cached {} items for scope {scope} (expires in {ttl_hours}h)",
            items.len()
        );
        Ok(())
    }

    /// Drop the entry for one scope.
    pub fn clear(&self, scope: &ScopeId) -> Result<(), CacheError> {
        self.backend.remove(&scope_key(scope))?;
        info!("Cleared cache for scope {scope}");
        Ok(())
    }

    /// Drop every entry.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        self.backend.remove_all()?;
        info!("Cleared all cache entries in {}", self.backend.describe());
        Ok(())
    }

    pub fn status(&self, scope: &ScopeId) -> CacheStatus {
        self.status_at(scope, Utc::now())
    }

    /// Status as of `now`.
    pub fn status_at(&self, scope: &ScopeId, now: DateTime<Utc>) -> CacheStatus {
        match self.load(scope) {
            None => CacheStatus {
                scope: scope.clone(),
                state: CacheState::Absent,
                item_count: 0,
                age_hours: 0.0,
                expires_in_hours: 0.0,
                captured_at: None,
            },
            Some(entry) => CacheStatus {
                scope: scope.clone(),
                state: if entry.is_fresh(now) {
                    CacheState::Valid
                } else {
                    CacheState::Stale
                },
                item_count: entry.items.len(),
                age_hours: entry.age_hours(now),
                expires_in_hours: entry.expires_in_hours(now),
                captured_at: Some(entry.captured_at),
            },
        }
    }
}

fn corrupt(scope: &ScopeId, reason: impl Into<String>) -> CacheError {
    CacheError::Corrupt {
        scope: scope.clone(),
        reason: reason.into(),
    }
}
