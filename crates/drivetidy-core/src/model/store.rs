/// Arena-backed, immutable snapshot of one scope's tree.
///
/// All items live in a single `Vec<Item>`. Parent, children and depth
/// indices are derived once in [`ItemStore::build`] and never mutated
/// afterwards, so a built store can be shared across analysis threads
/// behind a plain `&` or `Arc` without locking.
///
/// Paths are reconstructed on demand by walking parent links; the walk is
/// bounded by the precomputed depth, which doubles as proof that the tree
/// is acyclic.
use super::item::{Item, ItemId, ScopeId};
use crate::error::StoreError;
use std::collections::HashMap;

/// Lightweight index into the store's arena.
///
/// Uses `u32` to keep the derived index vectors small.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl NodeIndex {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The full (or scoped) snapshot of a remote tree.
#[derive(Debug, Clone)]
pub struct ItemStore {
    scope: ScopeId,

    /// Arena in listing order.
    nodes: Vec<Item>,

    index: HashMap<ItemId, NodeIndex>,

    /// Resolved parent for every node. `None` for top-level items.
    parents: Vec<Option<NodeIndex>>,

    /// Children per node, ordered by (name, id).
    children: Vec<Vec<NodeIndex>>,

    /// Path length from the top of the snapshot, 1 for top-level items.
    depths: Vec<u32>,

    /// Top-level items, ordered by (name, id).
    roots: Vec<NodeIndex>,

    /// The scope folder itself, when the listing included it.
    scope_root: Option<NodeIndex>,
}

impl ItemStore {
    /// Index a flat item sequence into a store.
    ///
    /// An item is top-level when it has no parent, when it *is* the scope
    /// folder, or when its parent is the scope folder and that folder was
    /// not part of the listing. Any other unresolved parent, a duplicate id,
    /// a file used as a parent, or a parent cycle fails the whole build.
    pub fn build(scope: ScopeId, items: Vec<Item>) -> Result<Self, StoreError> {
        if items.len() > u32::MAX as usize {
            return Err(StoreError::malformed(format!(
                "{} items exceed the store capacity",
                items.len()
            )));
        }

        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.id.clone(), NodeIndex::new(i)).is_some() {
                return Err(StoreError::malformed(format!(
                    "duplicate item id {}",
                    item.id
                )));
            }
        }

        let scope_item = scope.as_item_id();
        let scope_root = index.get(&scope_item).copied();

        let mut parents = Vec::with_capacity(items.len());
        for item in &items {
            let parent = match &item.parent_id {
                None => None,
                Some(_) if item.id == scope_item => None,
                Some(parent_id) => match index.get(parent_id) {
                    Some(&p) if items[p.idx()].is_folder() => Some(p),
                    Some(_) => {
                        return Err(StoreError::malformed(format!(
                            "item {} has file {} as its parent",
                            item.id, parent_id
                        )))
                    }
                    None if *parent_id == scope_item => None,
                    None => {
                        return Err(StoreError::malformed(format!(
                            "item {} references missing parent {}",
                            item.id, parent_id
                        )))
                    }
                },
            };
            parents.push(parent);
        }

        let depths = compute_depths(&items, &parents)?;

        let mut children: Vec<Vec<NodeIndex>> = vec![Vec::new(); items.len()];
        let mut roots = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[p.idx()].push(NodeIndex::new(i)),
                None => roots.push(NodeIndex::new(i)),
            }
        }

        let by_name = |a: &NodeIndex, b: &NodeIndex| {
            let (x, y) = (&items[a.idx()], &items[b.idx()]);
            x.name.cmp(&y.name).then_with(|| x.id.cmp(&y.id))
        };
        for list in children.iter_mut() {
            list.sort_unstable_by(by_name);
        }
        roots.sort_unstable_by(by_name);

        Ok(Self {
            scope,
            nodes: items,
            index,
            parents,
            children,
            depths,
            roots,
            scope_root,
        })
    }

    #[inline]
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Total number of items in the snapshot.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.index.get(id).map(|idx| &self.nodes[idx.idx()])
    }

    /// Like [`get`](Self::get), but unknown ids are an error.
    pub fn item(&self, id: &ItemId) -> Result<&Item, StoreError> {
        self.get(id).ok_or_else(|| not_found(id))
    }

    /// Root-to-node name sequence. Its length is the node's depth.
    pub fn path_of(&self, id: &ItemId) -> Result<Vec<&str>, StoreError> {
        let idx = self.require(id)?;
        Ok(self.path_segments(idx))
    }

    /// [`path_of`](Self::path_of) joined with `/`.
    pub fn display_path(&self, id: &ItemId) -> Result<String, StoreError> {
        let idx = self.require(id)?;
        Ok(self.path_string(idx))
    }

    pub fn depth_of(&self, id: &ItemId) -> Result<usize, StoreError> {
        let idx = self.require(id)?;
        Ok(self.depth(idx))
    }

    /// Containing folder, or `None` for a top-level item.
    pub fn parent_of(&self, id: &ItemId) -> Result<Option<&Item>, StoreError> {
        let idx = self.require(id)?;
        Ok(self.parents[idx.idx()].map(|p| &self.nodes[p.idx()]))
    }

    /// Direct children of a folder, ordered by name then id.
    ///
    /// Files and empty folders yield an empty vec.
    pub fn children_of(&self, id: &ItemId) -> Result<Vec<&Item>, StoreError> {
        let idx = self.require(id)?;
        if !self.nodes[idx.idx()].is_folder() {
            return Ok(Vec::new());
        }
        Ok(self.collect(&self.children[idx.idx()]))
    }

    /// Items with no parent inside the snapshot.
    pub fn roots(&self) -> Vec<&Item> {
        self.collect(&self.roots)
    }

    /// The scope folder itself, if the listing included it.
    pub fn scope_root(&self) -> Option<&Item> {
        self.scope_root.map(|idx| &self.nodes[idx.idx()])
    }

    /// Direct children of the scope root: the scope folder's children when
    /// it is present, otherwise the top-level items.
    pub fn root_children(&self) -> Vec<&Item> {
        match self.scope_root {
            Some(idx) => self.collect(&self.children[idx.idx()]),
            None => self.roots(),
        }
    }

    /// Every item, in listing order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> + '_ {
        self.nodes.iter()
    }

    pub fn files(&self) -> impl Iterator<Item = &Item> + '_ {
        self.nodes.iter().filter(|item| item.is_file())
    }

    pub fn folders(&self) -> impl Iterator<Item = &Item> + '_ {
        self.nodes.iter().filter(|item| item.is_folder())
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn folder_count(&self) -> usize {
        self.folders().count()
    }

    /// Sum of all file sizes in the snapshot.
    pub fn total_file_bytes(&self) -> u64 {
        self.files().map(Item::size).sum()
    }

    /// The flat item records, as they would be persisted.
    pub fn items(&self) -> &[Item] {
        &self.nodes
    }

    pub fn into_items(self) -> Vec<Item> {
        self.nodes
    }

    // ── Index-level access for analysis passes ─────────────────────────

    pub fn node_index(&self, id: &ItemId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    #[inline]
    pub fn node(&self, idx: NodeIndex) -> &Item {
        &self.nodes[idx.idx()]
    }

    #[inline]
    pub fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.parents[idx.idx()]
    }

    #[inline]
    pub fn child_indices(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.children[idx.idx()]
    }

    #[inline]
    pub fn depth(&self, idx: NodeIndex) -> usize {
        self.depths[idx.idx()] as usize
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex::new)
    }

    pub fn path_segments(&self, idx: NodeIndex) -> Vec<&str> {
        let mut segments = Vec::with_capacity(self.depth(idx));
        let mut current = Some(idx);
        while let Some(i) = current {
            segments.push(self.nodes[i.idx()].name.as_str());
            current = self.parents[i.idx()];
        }
        segments.reverse();
        segments
    }

    pub fn path_string(&self, idx: NodeIndex) -> String {
        self.path_segments(idx).join("/")
    }

    fn require(&self, id: &ItemId) -> Result<NodeIndex, StoreError> {
        self.node_index(id).ok_or_else(|| not_found(id))
    }

    fn collect(&self, indices: &[NodeIndex]) -> Vec<&Item> {
        indices.iter().map(|idx| &self.nodes[idx.idx()]).collect()
    }
}

fn not_found(id: &ItemId) -> StoreError {
    StoreError::NotFound { id: id.clone() }
}

/// Assign every node its path length, rejecting parent cycles.
///
/// Each walk climbs parent links until it reaches a node whose depth is
/// already known (or a root), then assigns depths on the way back down.
/// A node seen twice within one climb is part of a cycle. Every node is
/// climbed through at most once, so the pass is O(n) and cannot loop.
fn compute_depths(items: &[Item], parents: &[Option<NodeIndex>]) -> Result<Vec<u32>, StoreError> {
    // 0 = not yet assigned; real depths start at 1.
    let mut depths = vec![0u32; items.len()];
    let mut on_chain = vec![false; items.len()];
    let mut chain: Vec<NodeIndex> = Vec::new();

    for start in 0..items.len() {
        if depths[start] != 0 {
            continue;
        }

        let mut base = 0u32;
        let mut current = Some(NodeIndex::new(start));
        while let Some(idx) = current {
            let i = idx.idx();
            if depths[i] != 0 {
                base = depths[i];
                break;
            }
            if on_chain[i] {
                return Err(StoreError::malformed(format!(
                    "parent cycle through item {}",
                    items[i].id
                )));
            }
            on_chain[i] = true;
            chain.push(idx);
            current = parents[i];
        }

        for (offset, idx) in chain.drain(..).rev().enumerate() {
            depths[idx.idx()] = base + offset as u32 + 1;
            on_chain[idx.idx()] = false;
        }
    }

    Ok(depths)
}
