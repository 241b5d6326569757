/// Report output: the JSON summary handed to downstream consumers and CSV
/// exports for spreadsheets.
pub mod export;
pub mod summary;

pub use export::{export_csv, write_duplicates_csv, write_issues_csv};
pub use summary::{DuplicateSummary, OriginSummary, OutlineEntry, ScanSummary};
