/// Analysis modules: post-scan algorithms over an immutable `ItemStore`.
///
/// Duplicate detection and structure analysis are independent and run in
/// parallel via [`analyse`]; both only borrow the store.
pub mod age;
pub mod duplicates;
pub mod file_types;
pub mod names;
pub mod structure;
pub mod suggestions;
pub mod top_files;

pub use age::{count_stale_files, find_stale_files, StaleFile};
pub use duplicates::{find_duplicates, DuplicateDetector, DuplicateGroup, MatchTier};
pub use file_types::{analyse_file_types, categorise_extension, CategoryStats, FileCategory};
pub use structure::{
    analyse_structure, IssueKind, Severity, StructureAnalyzer, StructureConfig, StructureIssue,
};
pub use suggestions::{suggest, Suggestion};
pub use top_files::{top_files, LargestFile};

use crate::config::EngineConfig;
use crate::model::ItemStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Everything the analysis passes produce for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub duplicates: Vec<DuplicateGroup>,
    pub issues: Vec<StructureIssue>,
    pub file_types: Vec<CategoryStats>,
    pub largest_files: Vec<LargestFile>,
    /// Total stale files, which may exceed `stale_files.len()`.
    pub stale_file_count: usize,
    pub stale_files: Vec<StaleFile>,
    pub suggestions: Vec<Suggestion>,
}

impl AnalysisReport {
    /// Bytes recoverable by removing every non-retained duplicate.
    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates.iter().map(|g| g.wasted_bytes).sum()
    }
}

/// Run every analysis pass over `store`, treating `now` as the current time
/// for age checks.
pub fn analyse(store: &ItemStore, config: &EngineConfig, now: DateTime<Utc>) -> AnalysisReport {
    let start = Instant::now();
    let detector = DuplicateDetector::new(config.duplicates.similarity_threshold);
    let analyzer = StructureAnalyzer::new(config.structure.clone());

    let (duplicates, issues) = rayon::join(|| detector.detect(store), || analyzer.analyse(store));

    let stale_file_count = count_stale_files(store, now, config.stale.min_age_days);
    let stale_files = find_stale_files(
        store,
        now,
        config.stale.min_age_days,
        config.stale.max_results,
    );
    let suggestions = suggest(
        &issues,
        &duplicates,
        stale_file_count,
        config.stale.archive_suggestion_threshold,
    );

    info!(
        "Analysed {} items in {:.2}s: {} duplicate groups, {} structure issues",
        store.len(),
        start.elapsed().as_secs_f64(),
        duplicates.len(),
        issues.len()
    );

    AnalysisReport {
        duplicates,
        issues,
        file_types: analyse_file_types(store),
        largest_files: top_files(store, config.report.largest_files),
        stale_file_count,
        stale_files,
        suggestions,
    }
}
