/// Structural checks over a snapshot: deep nesting, root clutter,
/// scattered file types, folder naming and (optionally) empty folders.
///
/// Every check is an independent pass over the immutable store. The
/// output order is fixed: issues are grouped by kind in the order of
/// [`IssueKind`], and sorted by item id within a kind, so two runs over the
/// same store produce identical output.
use super::file_types::{categorise_name, FileCategory};
use crate::model::{ItemId, ItemStore, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Kinds of structural problem, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IssueKind {
    DeepNesting,
    RootClutter,
    ScatteredType,
    NamingInconsistency,
    EmptyFolder,
}

impl IssueKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::DeepNesting => "Deep Nesting",
            Self::RootClutter => "Root Clutter",
            Self::ScatteredType => "Scattered File Types",
            Self::NamingInconsistency => "Naming Inconsistency",
            Self::EmptyFolder => "Empty Folder",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::RootClutter => Severity::High,
            Self::DeepNesting | Self::ScatteredType => Severity::Medium,
            Self::NamingInconsistency | Self::EmptyFolder => Severity::Low,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// One structural problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Sorted item ids the issue is about.
    pub affected_item_ids: Vec<ItemId>,
    pub detail: String,
    /// Full path of the flagged folder, for single-folder issues.
    pub path: Option<String>,
    /// Replacement name for `NamingInconsistency`.
    pub suggested_name: Option<String>,
    /// Category for `ScatteredType`.
    pub category: Option<FileCategory>,
}

impl StructureIssue {
    fn new(kind: IssueKind, affected_item_ids: Vec<ItemId>, detail: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            affected_item_ids,
            detail,
            path: None,
            suggested_name: None,
            category: None,
        }
    }

    /// Advice shown next to the issue.
    pub fn remedy(&self) -> &'static str {
        match self.kind {
            IssueKind::DeepNesting => {
                "Flatten the hierarchy or merge intermediate folders into one descriptive name"
            }
            IssueKind::RootClutter => "Move root files into category folders",
            IssueKind::ScatteredType => "Create a dedicated folder for these files",
            IssueKind::NamingInconsistency => "Rename the folder using letters, digits, spaces, hyphens and underscores",
            IssueKind::EmptyFolder => "Remove the folder or merge it with a similar one",
        }
    }
}

/// Thresholds for the structure checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Folders deeper than this are flagged.
    pub max_depth: usize,
    /// More direct files than this in the scope root is clutter.
    pub root_file_limit: usize,
    /// A category in at least this many folders is scattered.
    pub scatter_min_folders: usize,
    pub report_empty_folders: bool,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            root_file_limit: 10,
            scatter_min_folders: 3,
            report_empty_folders: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructureAnalyzer {
    config: StructureConfig,
}

impl StructureAnalyzer {
    pub fn new(config: StructureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    /// Run every check and return the issues in reporting order.
    pub fn analyse(&self, store: &ItemStore) -> Vec<StructureIssue> {
        let mut issues = self.deep_nesting(store);
        issues.extend(self.root_clutter(store));
        issues.extend(self.scattered_types(store));
        issues.extend(naming_inconsistencies(store));
        if self.config.report_empty_folders {
            issues.extend(empty_folders(store));
        }
        debug!("Structure analysis found {} issues", issues.len());
        issues
    }

    fn deep_nesting(&self, store: &ItemStore) -> Vec<StructureIssue> {
        let mut deep: Vec<NodeIndex> = store
            .indices()
            .filter(|&idx| store.node(idx).is_folder() && store.depth(idx) > self.config.max_depth)
            .collect();
        sort_by_id(store, &mut deep);

        deep.into_iter()
            .map(|idx| {
                let item = store.node(idx);
                let path = store.path_string(idx);
                let mut issue = StructureIssue::new(
                    IssueKind::DeepNesting,
                    vec![item.id.clone()],
                    format!(
                        "Folder is nested {} levels deep (limit {}): {path}",
                        store.depth(idx),
                        self.config.max_depth
                    ),
                );
                issue.path = Some(path);
                issue
            })
            .collect()
    }

    fn root_clutter(&self, store: &ItemStore) -> Option<StructureIssue> {
        let root_children = store.root_children();
        let mut files: Vec<ItemId> = root_children
            .iter()
            .filter(|item| item.is_file())
            .map(|item| item.id.clone())
            .collect();
        if files.len() <= self.config.root_file_limit {
            return None;
        }
        files.sort();

        let folders = root_children.len() - files.len();
        let detail = format!(
            "{} files sit directly in the root next to {folders} folder(s) (limit {})",
            files.len(),
            self.config.root_file_limit
        );
        Some(StructureIssue::new(IssueKind::RootClutter, files, detail))
    }

    fn scattered_types(&self, store: &ItemStore) -> Vec<StructureIssue> {
        let mut locations: BTreeMap<FileCategory, BTreeSet<NodeIndex>> = BTreeMap::new();
        let mut counts: BTreeMap<FileCategory, usize> = BTreeMap::new();

        for idx in store.indices() {
            let item = store.node(idx);
            if !item.is_file() {
                continue;
            }
            let category = categorise_name(&item.name);
            if category == FileCategory::Other {
                continue;
            }
            // Files outside any folder item are the root's concern.
            let Some(parent) = store.parent_index(idx) else {
                continue;
            };
            locations.entry(category).or_default().insert(parent);
            *counts.entry(category).or_default() += 1;
        }

        let mut issues: Vec<StructureIssue> = locations
            .into_iter()
            .filter(|(_, folders)| folders.len() >= self.config.scatter_min_folders)
            .filter(|(category, folders)| {
                !folders
                    .iter()
                    .any(|&f| category.is_named_by(&store.node(f).name))
            })
            .map(|(category, folders)| {
                let mut ids: Vec<ItemId> = folders
                    .iter()
                    .map(|&f| store.node(f).id.clone())
                    .collect();
                ids.sort();
                let files = counts.get(&category).copied().unwrap_or_default();
                let detail = format!(
                    "{files} {} file(s) are spread across {} folders, none named for them",
                    category.label(),
                    ids.len()
                );
                let mut issue = StructureIssue::new(IssueKind::ScatteredType, ids, detail);
                issue.category = Some(category);
                issue
            })
            .collect();

        issues.sort_by(|a, b| {
            a.affected_item_ids
                .first()
                .cmp(&b.affected_item_ids.first())
                .then_with(|| a.category.cmp(&b.category))
        });
        issues
    }
}

/// Run the structure checks with default thresholds.
pub fn analyse_structure(store: &ItemStore) -> Vec<StructureIssue> {
    StructureAnalyzer::default().analyse(store)
}

fn naming_inconsistencies(store: &ItemStore) -> Vec<StructureIssue> {
    let mut flagged: Vec<(NodeIndex, Vec<&'static str>)> = store
        .indices()
        .filter(|&idx| store.node(idx).is_folder())
        .filter_map(|idx| {
            let problems = naming_problems(&store.node(idx).name);
            (!problems.is_empty()).then_some((idx, problems))
        })
        .collect();
    flagged.sort_by(|(a, _), (b, _)| store.node(*a).id.cmp(&store.node(*b).id));

    flagged
        .into_iter()
        .map(|(idx, problems)| {
            let item = store.node(idx);
            let suggestion = normalise_folder_name(&item.name);
            let mut issue = StructureIssue::new(
                IssueKind::NamingInconsistency,
                vec![item.id.clone()],
                format!(
                    "Folder name {:?} has {}; suggested {suggestion:?}",
                    item.name.as_str(),
                    problems.join(" and ")
                ),
            );
            issue.path = Some(store.path_string(idx));
            issue.suggested_name = Some(suggestion);
            issue
        })
        .collect()
}

fn empty_folders(store: &ItemStore) -> Vec<StructureIssue> {
    let mut empty: Vec<NodeIndex> = store
        .indices()
        .filter(|&idx| store.node(idx).is_folder() && store.child_indices(idx).is_empty())
        .collect();
    sort_by_id(store, &mut empty);

    empty
        .into_iter()
        .map(|idx| {
            let path = store.path_string(idx);
            let mut issue = StructureIssue::new(
                IssueKind::EmptyFolder,
                vec![store.node(idx).id.clone()],
                format!("Folder is empty: {path}"),
            );
            issue.path = Some(path);
            issue
        })
        .collect()
}

fn sort_by_id(store: &ItemStore, indices: &mut [NodeIndex]) {
    indices.sort_by(|a, b| store.node(*a).id.cmp(&store.node(*b).id));
}

fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || c == '-' || c == '_'
}

/// Problems with a folder name, empty when the name is clean.
pub fn naming_problems(name: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if name.chars().any(|c| !is_allowed_char(c)) {
        problems.push("disallowed characters");
    }
    if name != name.trim() {
        problems.push("leading or trailing whitespace");
    }
    if name.contains("  ") {
        problems.push("repeated spaces");
    }
    problems
}

/// Replace disallowed characters with spaces, collapse whitespace and trim.
pub fn normalise_folder_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if is_allowed_char(c) { c } else { ' ' })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "Untitled Folder".to_string()
    } else {
        collapsed
    }
}
