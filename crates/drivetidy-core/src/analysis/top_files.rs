/// Top-N largest files analysis.
///
/// Extracts the largest individual files from a snapshot, with their
/// reconstructed paths, for reports and the inference summary.
use crate::model::{ItemId, ItemStore, NodeIndex};
use serde::Serialize;

/// A single entry in the "largest files" results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LargestFile {
    pub id: ItemId,
    /// Full path (reconstructed).
    pub path: String,
    /// File size in bytes.
    pub size: u64,
}

/// Get the top N largest files from the store, largest first (ties by id).
pub fn top_files(store: &ItemStore, n: usize) -> Vec<LargestFile> {
    if n == 0 {
        return Vec::new();
    }

    let mut files: Vec<NodeIndex> = store
        .indices()
        .filter(|&idx| store.node(idx).is_file())
        .collect();

    let order = |a: &NodeIndex, b: &NodeIndex| {
        let (x, y) = (store.node(*a), store.node(*b));
        y.size().cmp(&x.size()).then_with(|| x.id.cmp(&y.id))
    };
    if files.len() > n {
        files.select_nth_unstable_by(n - 1, order);
        files.truncate(n);
    }
    files.sort_unstable_by(order);

    files
        .into_iter()
        .map(|idx| LargestFile {
            id: store.node(idx).id.clone(),
            path: store.path_string(idx),
            size: store.node(idx).size(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, ScopeId};

    #[test]
    fn largest_first_with_paths() {
        let s = ItemStore::build(
            ScopeId::entire_drive(),
            vec![
                Item::folder("v", "Videos", None),
                Item::file("a", "clip.mp4", 900, Some("v")),
                Item::file("b", "notes.txt", 5, None),
                Item::file("c", "song.mp3", 300, None),
            ],
        )
        .unwrap();

        let top = top_files(&s, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].path, "Videos/clip.mp4");
        assert_eq!(top[0].size, 900);
        assert_eq!(top[1].id.as_str(), "c");
        assert!(top_files(&s, 0).is_empty());
        assert_eq!(top_files(&s, 10).len(), 3);
    }
}
