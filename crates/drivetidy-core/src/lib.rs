/// DriveTidy Core: snapshot caching, duplicate detection and structure
/// analysis for remote drive trees.
///
/// This crate contains all business logic and no provider client. The
/// remote listing is abstracted behind [`scanner::RemoteListing`], so any
/// frontend can plug in its own transport.
///
/// # Modules
///
/// - [`model`]: Flat item records and the indexed, immutable `ItemStore`.
/// - [`cache`]: Per-scope snapshot persistence with a wall-clock TTL.
/// - [`scanner`]: Cache-or-fetch coordination with progress and cancellation.
/// - [`analysis`]: Duplicate tiers, structure issues and suggestions.
/// - [`report`]: JSON summary and CSV export.
/// - [`config`]: TOML engine configuration.
/// - [`error`]: Error types for every fallible operation.
pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod report;
pub mod scanner;

pub use analysis::{analyse, AnalysisReport};
pub use cache::SnapshotCache;
pub use config::EngineConfig;
pub use model::{Item, ItemId, ItemKind, ItemStore, ScopeId};
pub use scanner::{start_scan, ScanCoordinator, ScanOptions, ScanOutcome};
