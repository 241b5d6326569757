//! Offline stand-in for the remote listing: a JSON array of items exported
//! from the provider, served in fixed-size pages.
//!
//! The file is read on the first page request, so a scan that is answered
//! from the cache never touches it. A folder scope is served as that folder
//! plus everything below it.

use drivetidy_core::error::ListingError;
use drivetidy_core::scanner::{ListingPage, RemoteListing};
use drivetidy_core::{Item, ItemId, ScopeId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Items per page, matching the provider's maximum page size.
pub const PAGE_SIZE: usize = 1_000;

pub struct JsonExportListing {
    path: PathBuf,
    page_size: usize,
    loaded: Mutex<Option<Arc<Vec<Item>>>>,
    /// Items of the last folder scope served, so paging does not refilter.
    scoped: Mutex<Option<(ScopeId, Arc<Vec<Item>>)>>,
}

impl JsonExportListing {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_page_size(path, PAGE_SIZE)
    }

    pub fn with_page_size(path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            path: path.into(),
            page_size: page_size.max(1),
            loaded: Mutex::new(None),
            scoped: Mutex::new(None),
        }
    }

    fn items(&self) -> Result<Arc<Vec<Item>>, ListingError> {
        let mut loaded = self.loaded.lock();
        if let Some(items) = loaded.as_ref() {
            return Ok(Arc::clone(items));
        }

        let unavailable = |e: &dyn std::fmt::Display| ListingError::RemoteUnavailable {
            message: format!("{}: {e}", self.path.display()),
        };
        let text = std::fs::read_to_string(&self.path).map_err(|e| unavailable(&e))?;
        let items: Vec<Item> = serde_json::from_str(&text).map_err(|e| unavailable(&e))?;
        debug!("Loaded {} items from {}", items.len(), self.path.display());

        let items = Arc::new(items);
        *loaded = Some(Arc::clone(&items));
        Ok(items)
    }

    fn items_in_scope(&self, scope: &ScopeId) -> Result<Arc<Vec<Item>>, ListingError> {
        let all = self.items()?;
        if scope.is_entire_drive() {
            return Ok(all);
        }

        let mut scoped = self.scoped.lock();
        if let Some((cached, items)) = scoped.as_ref() {
            if cached == scope {
                return Ok(Arc::clone(items));
            }
        }
        let items = Arc::new(within_folder(&all, &scope.as_item_id()));
        debug!("Scope {scope}: {} of {} exported items", items.len(), all.len());
        *scoped = Some((scope.clone(), Arc::clone(&items)));
        Ok(items)
    }
}

/// The folder `root` and its descendants, in export order.
///
/// Ancestry is followed through `parent_id`; a chain that ends at "root",
/// at `null`, at an unknown id or in a cycle is outside the folder.
fn within_folder(items: &[Item], root: &ItemId) -> Vec<Item> {
    let parents: HashMap<&ItemId, Option<&ItemId>> = items
        .iter()
        .map(|item| (&item.id, item.parent_id.as_ref()))
        .collect();
    let mut inside: HashMap<&ItemId, bool> = HashMap::with_capacity(items.len());

    for item in items {
        let mut chain = Vec::new();
        let mut current = Some(&item.id);
        let verdict = loop {
            let Some(id) = current else { break false };
            if id == root {
                break true;
            }
            if let Some(&known) = inside.get(id) {
                break known;
            }
            if chain.len() > items.len() {
                break false;
            }
            chain.push(id);
            current = parents.get(id).copied().flatten();
        };
        for id in chain {
            inside.insert(id, verdict);
        }
    }

    items
        .iter()
        .filter(|item| item.id == *root || inside.get(&item.id).copied().unwrap_or(false))
        .cloned()
        .collect()
}

impl RemoteListing for JsonExportListing {
    fn list_page(
        &self,
        scope: &ScopeId,
        page_token: Option<&str>,
    ) -> Result<ListingPage, ListingError> {
        let items = self.items_in_scope(scope)?;
        let offset = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ListingError::RemoteUnavailable {
                    message: format!("invalid page token {token:?}"),
                })?,
        };

        let end = (offset + self.page_size).min(items.len());
        let page = items.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = (end < items.len()).then(|| end.to_string());
        Ok(ListingPage {
            items: page,
            next_page_token,
        })
    }

    fn identifier(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_export(dir: &TempDir, count: usize) -> PathBuf {
        let items: Vec<Item> = (0..count)
            .map(|i| Item::file(format!("f{i}"), format!("file{i}.txt"), i as u64, None))
            .collect();
        let path = dir.path().join("items.json");
        std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();
        path
    }

    #[test]
    fn pages_until_the_export_is_exhausted() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::with_page_size(write_export(&tmp, 5), 2);
        let scope = ScopeId::entire_drive();

        let mut token: Option<String> = None;
        let mut sizes = Vec::new();
        loop {
            let page = listing.list_page(&scope, token.as_deref()).unwrap();
            sizes.push(page.items.len());
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn empty_export_is_one_empty_page() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::new(write_export(&tmp, 0));
        let page = listing.list_page(&ScopeId::entire_drive(), None).unwrap();
        assert!(page.items.is_empty());
        assert!(page.is_last());
    }

    fn write_tree(dir: &TempDir) -> PathBuf {
        let items = vec![
            Item::folder("f1", "Projects", Some("root")),
            Item::file("loose", "loose.txt", 1, Some("root")),
            Item::file("a", "a.txt", 2, Some("f1")),
            Item::folder("other", "Other", None),
            Item::folder("sub", "Sub", Some("f1")),
            Item::file("o1", "o1.txt", 3, Some("other")),
            Item::file("deep", "deep.txt", 4, Some("sub")),
            Item::file("orphan", "orphan.txt", 5, Some("gone")),
        ];
        let path = dir.path().join("tree.json");
        std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();
        path
    }

    fn drain(listing: &JsonExportListing, scope: &ScopeId) -> Vec<Vec<String>> {
        let mut token: Option<String> = None;
        let mut pages = Vec::new();
        loop {
            let page = listing.list_page(scope, token.as_deref()).unwrap();
            pages.push(page.items.iter().map(|i| i.id.to_string()).collect());
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        pages
    }

    #[test]
    fn folder_scope_serves_only_that_subtree() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::with_page_size(write_tree(&tmp), 3);
        let scope = ScopeId::new("f1");

        let pages = drain(&listing, &scope);
        assert_eq!(pages, vec![vec!["f1", "a", "sub"], vec!["deep"]]);
    }

    #[test]
    fn folder_scope_builds_a_store() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::new(write_tree(&tmp));
        let scope = ScopeId::new("f1");

        let page = listing.list_page(&scope, None).unwrap();
        let store = drivetidy_core::ItemStore::build(scope, page.items).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.total_file_bytes(), 6);
    }

    #[test]
    fn unknown_folder_scope_is_empty() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::new(write_tree(&tmp));
        let page = listing.list_page(&ScopeId::new("nowhere"), None).unwrap();
        assert!(page.items.is_empty());
        assert!(page.is_last());
    }

    #[test]
    fn entire_drive_scope_serves_everything() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::new(write_tree(&tmp));
        let page = listing.list_page(&ScopeId::entire_drive(), None).unwrap();
        assert_eq!(page.items.len(), 8);
    }

    #[test]
    fn missing_file_is_remote_unavailable() {
        let tmp = TempDir::new().unwrap();
        let listing = JsonExportListing::new(tmp.path().join("missing.json"));
        let err = listing
            .list_page(&ScopeId::entire_drive(), None)
            .unwrap_err();
        assert!(matches!(err, ListingError::RemoteUnavailable { .. }));
    }
}
