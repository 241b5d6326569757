/// Serialisable snapshot summary for downstream consumers such as a local
/// inference service.
///
/// Everything is resolved to paths and plain numbers so the consumer
/// never needs the store itself.
use crate::analysis::{
    AnalysisReport, CategoryStats, DuplicateGroup, LargestFile, MatchTier, StructureIssue,
    Suggestion,
};
use crate::model::{ItemStore, NodeIndex, ScopeId};
use crate::scanner::SnapshotOrigin;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginSummary {
    /// `"cache"` or `"fresh"`.
    pub source: &'static str,
    pub captured_at: DateTime<Utc>,
    pub stale: bool,
}

impl From<&SnapshotOrigin> for OriginSummary {
    fn from(origin: &SnapshotOrigin) -> Self {
        match *origin {
            SnapshotOrigin::Cache { captured_at, stale } => Self {
                source: "cache",
                captured_at,
                stale,
            },
            SnapshotOrigin::Fresh { captured_at, .. } => Self {
                source: "fresh",
                captured_at,
                stale: false,
            },
        }
    }
}

/// One folder in the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub path: String,
    pub depth: usize,
    /// Direct child files.
    pub files: usize,
    /// Direct child folders.
    pub folders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateSummary {
    pub method: MatchTier,
    pub confidence: u8,
    pub wasted_bytes: u64,
    pub retained_path: String,
    pub member_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub scope: ScopeId,
    pub origin: OriginSummary,
    pub total_files: usize,
    pub total_folders: usize,
    pub total_bytes: u64,
    /// Folders ordered by (depth, path), capped.
    pub folder_outline: Vec<OutlineEntry>,
    pub outline_truncated: bool,
    pub file_types: Vec<CategoryStats>,
    pub largest_files: Vec<LargestFile>,
    pub wasted_bytes: u64,
    pub duplicates: Vec<DuplicateSummary>,
    pub issues: Vec<StructureIssue>,
    pub suggestions: Vec<Suggestion>,
}

impl ScanSummary {
    pub fn build(
        store: &ItemStore,
        origin: &SnapshotOrigin,
        report: &AnalysisReport,
        outline_limit: usize,
    ) -> Self {
        let (folder_outline, outline_truncated) = folder_outline(store, outline_limit);
        Self {
            scope: store.scope().clone(),
            origin: origin.into(),
            total_files: store.file_count(),
            total_folders: store.folder_count(),
            total_bytes: store.total_file_bytes(),
            folder_outline,
            outline_truncated,
            file_types: report.file_types.clone(),
            largest_files: report.largest_files.clone(),
            wasted_bytes: report.wasted_bytes(),
            duplicates: report
                .duplicates
                .iter()
                .map(|group| summarise_group(store, group))
                .collect(),
            issues: report.issues.clone(),
            suggestions: report.suggestions.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn folder_outline(store: &ItemStore, limit: usize) -> (Vec<OutlineEntry>, bool) {
    let mut folders: Vec<(usize, String, NodeIndex)> = store
        .indices()
        .filter(|&idx| store.node(idx).is_folder())
        .map(|idx| (store.depth(idx), store.path_string(idx), idx))
        .collect();
    folders.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let truncated = folders.len() > limit;
    let outline = folders
        .into_iter()
        .take(limit)
        .map(|(depth, path, idx)| {
            let children = store.child_indices(idx);
            let files = children
                .iter()
                .filter(|&&c| store.node(c).is_file())
                .count();
            OutlineEntry {
                path,
                depth,
                files,
                folders: children.len() - files,
            }
        })
        .collect();
    (outline, truncated)
}

/// Ids missing from the store fall back to the raw id.
fn path_or_id(store: &ItemStore, id: &crate::model::ItemId) -> String {
    store
        .display_path(id)
        .unwrap_or_else(|_| id.as_str().to_string())
}

fn summarise_group(store: &ItemStore, group: &DuplicateGroup) -> DuplicateSummary {
    DuplicateSummary {
        method: group.method,
        confidence: group.confidence,
        wasted_bytes: group.wasted_bytes,
        retained_path: path_or_id(store, &group.retained),
        member_paths: group.members.iter().map(|id| path_or_id(store, id)).collect(),
    }
}
