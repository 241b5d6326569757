/// Error taxonomy for the snapshot engine.
///
/// Each concern gets its own enum so callers can match on exactly the
/// failures a component can produce. [`ScanError`] is the only type that
/// crosses the coordinator boundary and always names the scope and stage.
use crate::model::{ItemId, ScopeId};
use std::fmt;
use thiserror::Error;

/// Failures while building or querying an [`ItemStore`](crate::model::ItemStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The item sequence does not describe a well-formed tree. Fatal for
    /// the build; no partially-built store is ever returned.
    #[error("malformed tree: {reason}")]
    MalformedTree { reason: String },

    /// Lookup of an id that is not part of the store.
    #[error("item not found: {id}")]
    NotFound { id: ItemId },
}

impl StoreError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTree {
            reason: reason.into(),
        }
    }
}

/// Failures reported by the remote listing collaborator.
///
/// The coordinator never rewrites these; they reach the caller intact
/// inside [`ScanError::Listing`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("remote storage unavailable: {message}")]
    RemoteUnavailable { message: String },

    #[error("authentication failed: {message}")]
    Auth { message: String },

    #[error("remote quota exceeded: {message}")]
    QuotaExceeded { message: String },
}

/// Failures inside the snapshot cache.
///
/// `SnapshotCache::load` downgrades all of these to a cache miss; they only
/// surface from `save` and `clear`.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt cache entry for scope {scope}: {reason}")]
    Corrupt { scope: ScopeId, reason: String },

    #[error("ttl must be a finite, non-negative number of hours (got {ttl_hours})")]
    InvalidTtl { ttl_hours: f64 },
}

/// Failures while loading or validating [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

/// Failures while writing CSV reports.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("report references an item outside the snapshot: {0}")]
    Store(#[from] StoreError),
}

/// Coordinator state in which a scan failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    CheckCache,
    Fetch,
    Serve,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CheckCache => "cache check",
            Self::Fetch => "fetch",
            Self::Serve => "serve",
        };
        f.write_str(label)
    }
}

/// A failed scan, always tagged with the scope and stage.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scope {scope}: {stage} failed: {source}")]
    Listing {
        scope: ScopeId,
        stage: ScanStage,
        #[source]
        source: ListingError,
    },

    #[error("scope {scope}: {stage} failed: {source}")]
    Tree {
        scope: ScopeId,
        stage: ScanStage,
        #[source]
        source: StoreError,
    },

    #[error("scope {scope}: fetch cancelled after {pages} page(s)")]
    Cancelled { scope: ScopeId, pages: u64 },

    #[error("scope {scope}: failed to start scan thread: {source}")]
    Spawn {
        scope: ScopeId,
        #[source]
        source: std::io::Error,
    },

    #[error("scope {scope}: scan thread panicked")]
    Panicked { scope: ScopeId },
}

impl ScanError {
    /// Scope the failed scan was targeting.
    pub fn scope(&self) -> &ScopeId {
        match self {
            Self::Listing { scope, .. }
            | Self::Tree { scope, .. }
            | Self::Cancelled { scope, .. }
            | Self::Spawn { scope, .. }
            | Self::Panicked { scope } => scope,
        }
    }

    /// Stage the scan was in, where one applies.
    pub fn stage(&self) -> Option<ScanStage> {
        match self {
            Self::Listing { stage, .. } | Self::Tree { stage, .. } => Some(*stage),
            Self::Cancelled { .. } => Some(ScanStage::Fetch),
            Self::Spawn { .. } | Self::Panicked { .. } => None,
        }
    }

    /// The collaborator's error, exactly as it was returned.
    pub fn listing_error(&self) -> Option<&ListingError> {
        match self {
            Self::Listing { source, .. } => Some(source),
            _ => None,
        }
    }
}
