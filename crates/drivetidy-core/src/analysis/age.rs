/// File age analysis: find old/stale files that haven't been modified recently.
use crate::model::{ItemId, ItemStore};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// A file identified as old/stale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleFile {
    pub id: ItemId,
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub age_days: i64,
}

/// Number of files not modified in the last `min_age_days` days as of `now`.
pub fn count_stale_files(store: &ItemStore, now: DateTime<Utc>, min_age_days: u32) -> usize {
    let threshold = TimeDelta::days(i64::from(min_age_days));
    store
        .files()
        .filter_map(|item| item.modified_at)
        .filter(|&modified| now - modified >= threshold)
        .count()
}

/// Find files not modified in the last `min_age_days` days as of `now`,
/// sorted by size descending (ties by id).
///
/// Files without a modification time are skipped. Returns an empty vec
/// immediately when `max_results == 0`, which also keeps the
/// `max_results - 1` below from underflowing.
pub fn find_stale_files(
    store: &ItemStore,
    now: DateTime<Utc>,
    min_age_days: u32,
    max_results: usize,
) -> Vec<StaleFile> {
    if max_results == 0 {
        return Vec::new();
    }

    let threshold = TimeDelta::days(i64::from(min_age_days));

    let mut stale: Vec<StaleFile> = store
        .indices()
        .filter_map(|idx| {
            let item = store.node(idx);
            if !item.is_file() {
                return None;
            }
            let modified = item.modified_at?;
            let age = now - modified;
            (age >= threshold).then(|| StaleFile {
                id: item.id.clone(),
                path: store.path_string(idx),
                size: item.size(),
                last_modified: modified,
                age_days: age.num_days(),
            })
        })
        .collect();

    let order = |a: &StaleFile, b: &StaleFile| b.size.cmp(&a.size).then_with(|| a.id.cmp(&b.id));

    // Partial sort: O(n) select + O(k log k) sort of top-k, vs O(n log n) full sort.
    if stale.len() > max_results {
        stale.select_nth_unstable_by(max_results - 1, order);
        stale.truncate(max_results);
    }
    stale.sort_unstable_by(order);
    stale
}
