/// CSV export of duplicate groups and structure issues.
use crate::analysis::{AnalysisReport, DuplicateGroup, StructureIssue};
use crate::error::ExportError;
use crate::model::ItemStore;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DUPLICATES_FILE: &str = "duplicates.csv";
pub const ISSUES_FILE: &str = "issues.csv";

#[derive(Serialize)]
struct DuplicateRow<'a> {
    group: usize,
    method: &'static str,
    confidence: u8,
    wasted_bytes: u64,
    retained: bool,
    id: &'a str,
    path: String,
    size: u64,
}

#[derive(Serialize)]
struct IssueRow<'a> {
    kind: &'static str,
    severity: String,
    affected: usize,
    item_ids: String,
    path: Option<&'a str>,
    suggested_name: Option<&'a str>,
    detail: &'a str,
}

/// One row per group member. Groups are numbered from 1 in report order.
pub fn write_duplicates_csv<W: Write>(
    writer: W,
    store: &ItemStore,
    groups: &[DuplicateGroup],
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (n, group) in groups.iter().enumerate() {
        for id in &group.members {
            let item = store.item(id)?;
            csv.serialize(DuplicateRow {
                group: n + 1,
                method: group.method.label(),
                confidence: group.confidence,
                wasted_bytes: group.wasted_bytes,
                retained: *id == group.retained,
                id: id.as_str(),
                path: store.display_path(id)?,
                size: item.size(),
            })?;
        }
    }
    csv.flush()?;
    Ok(())
}

/// One row per issue. Affected ids are joined with `;`.
pub fn write_issues_csv<W: Write>(writer: W, issues: &[StructureIssue]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for issue in issues {
        let item_ids = issue
            .affected_item_ids
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(";");
        csv.serialize(IssueRow {
            kind: issue.kind.label(),
            severity: issue.severity.to_string(),
            affected: issue.affected_item_ids.len(),
            item_ids,
            path: issue.path.as_deref(),
            suggested_name: issue.suggested_name.as_deref(),
            detail: &issue.detail,
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Write `duplicates.csv` and `issues.csv` into `dir`, creating it if
/// needed. Returns the written paths.
pub fn export_csv(
    dir: &Path,
    store: &ItemStore,
    report: &AnalysisReport,
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;

    let duplicates_path = dir.join(DUPLICATES_FILE);
    write_duplicates_csv(
        BufWriter::new(File::create(&duplicates_path)?),
        store,
        &report.duplicates,
    )?;

    let issues_path = dir.join(ISSUES_FILE);
    write_issues_csv(BufWriter::new(File::create(&issues_path)?), &report.issues)?;

    info!("Exported CSV reports to {}", dir.display());
    Ok(vec![duplicates_path, issues_path])
}
