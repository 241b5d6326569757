/// Rule-based reorganisation proposals derived from analysis results.
///
/// Suggestions are advice only. Nothing here moves, renames or deletes
/// anything.
use super::duplicates::DuplicateGroup;
use super::structure::{IssueKind, StructureIssue};
use crate::model::size::format_size;
use serde::Serialize;

/// Renames listed in full before the rest are summarised.
const MAX_LISTED_RENAMES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
    pub expected_improvement: String,
}

impl Suggestion {
    fn new(title: &str, description: String, actions: Vec<String>, expected_improvement: &str) -> Self {
        Self {
            title: title.to_string(),
            description,
            actions,
            expected_improvement: expected_improvement.to_string(),
        }
    }
}

/// Build suggestions from issues, duplicate groups and the number of stale
/// files. Archiving is proposed once `stale_files` exceeds
/// `archive_threshold`. The order is fixed.
pub fn suggest(
    issues: &[StructureIssue],
    duplicates: &[DuplicateGroup],
    stale_files: usize,
    archive_threshold: usize,
) -> Vec<Suggestion> {
    let of_kind = |kind: IssueKind| issues.iter().filter(move |i| i.kind == kind);
    let mut out = Vec::new();

    if let Some(clutter) = of_kind(IssueKind::RootClutter).next() {
        out.push(Suggestion::new(
            "Organize Root Directory",
            format!(
                "Move {} loose root files into a clean top-level structure",
                clutter.affected_item_ids.len()
            ),
            vec![
                "Create main categories: Documents, Images, Videos, Projects".into(),
                "Move files from the root into the matching category folder".into(),
                "Add date-based subfolders where a category grows large".into(),
            ],
            "Significantly improved navigation and reduced clutter",
        ));
    }

    let scattered: Vec<&str> = of_kind(IssueKind::ScatteredType)
        .filter_map(|i| i.category.map(|c| c.label()))
        .collect();
    if !scattered.is_empty() {
        out.push(Suggestion::new(
            "Consolidate File Types",
            format!("Group scattered files together: {}", scattered.join(", ")),
            scattered
                .iter()
                .map(|label| format!("Create a dedicated {label} folder and move scattered {label} files into it"))
                .chain(std::iter::once(
                    "Consider project-based folders for work files".to_string(),
                ))
                .collect(),
            "Easier file discovery and better organization",
        ));
    }

    let deep = of_kind(IssueKind::DeepNesting).count();
    if deep > 0 {
        out.push(Suggestion::new(
            "Flatten Deep Hierarchies",
            format!("Reduce nesting for {deep} folder(s) buried too deep"),
            vec![
                "Identify folders nested more than 4-5 levels deep".into(),
                "Combine intermediate folders into one descriptive name".into(),
                "Move frequently accessed files closer to the root".into(),
            ],
            "Faster navigation and reduced complexity",
        ));
    }

    let renames: Vec<String> = of_kind(IssueKind::NamingInconsistency)
        .filter_map(|i| {
            let from = i.path.as_deref()?;
            let to = i.suggested_name.as_deref()?;
            Some(format!("Rename \"{from}\" to \"{to}\""))
        })
        .collect();
    if !renames.is_empty() {
        let total = renames.len();
        let mut actions: Vec<String> = renames.into_iter().take(MAX_LISTED_RENAMES).collect();
        if total > MAX_LISTED_RENAMES {
            actions.push(format!("...and {} more", total - MAX_LISTED_RENAMES));
        }
        out.push(Suggestion::new(
            "Normalize Folder Names",
            format!("{total} folder name(s) use unusual characters or spacing"),
            actions,
            "Consistent, searchable folder names",
        ));
    }

    let empty = of_kind(IssueKind::EmptyFolder).count();
    if empty > 0 {
        out.push(Suggestion::new(
            "Remove Empty Folders",
            format!("{empty} folder(s) contain nothing"),
            vec!["Delete empty folders or merge them with similar ones".into()],
            "Less noise when browsing",
        ));
    }

    if stale_files > archive_threshold {
        out.push(Suggestion::new(
            "Archive Old Content",
            format!("Archive {stale_files} files that have not been modified in a long time"),
            vec![
                "Create an 'Archive' folder in the root".into(),
                "Move old files into the archive".into(),
                "Organize the archive by year or project".into(),
            ],
            "Reduced clutter and improved performance",
        ));
    }

    if !duplicates.is_empty() {
        let wasted: u64 = duplicates.iter().map(|g| g.wasted_bytes).sum();
        out.push(Suggestion::new(
            "Review Duplicates",
            format!(
                "{} duplicate group(s) waste about {}",
                duplicates.len(),
                format_size(wasted)
            ),
            vec![
                "Start with the highest-confidence groups".into(),
                "Keep the most recently modified copy in each group".into(),
                "Treat size-only matches as candidates to inspect, not confirmed copies".into(),
            ],
            "Recovered storage and less confusion over which copy is current",
        ));
    }

    out
}
