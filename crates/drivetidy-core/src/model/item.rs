/// A single node of the remote tree, as returned by the listing collaborator.
///
/// Items are plain records: they name their parent by id and carry no
/// links of their own. All relationships are derived by [`ItemStore`]
/// after the full listing has been collected.
///
/// [`ItemStore`]: super::ItemStore
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque remote identifier, stable across fetches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(CompactString);

impl ItemId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The subtree a scan or cache entry is restricted to.
///
/// The whole drive is addressed by the provider's `root` alias, which never
/// appears as an item of its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(CompactString);

impl ScopeId {
    /// Sentinel id for the entire drive.
    pub const ENTIRE_DRIVE: &'static str = "root";

    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    pub fn entire_drive() -> Self {
        Self::new(Self::ENTIRE_DRIVE)
    }

    pub fn is_entire_drive(&self) -> bool {
        self.0 == Self::ENTIRE_DRIVE
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The scope root viewed as an item id (it may or may not be present
    /// in the snapshot itself).
    pub fn as_item_id(&self) -> ItemId {
        ItemId::new(self.as_str())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::entire_drive()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File vs. folder, with the data that only makes sense for one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    File { size: u64 },
    Folder,
}

/// One file or folder in the remote tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    /// Display name only, never a path.
    pub name: CompactString,

    pub kind: ItemKind,

    /// Containing folder. `None` for roots.
    #[serde(default)]
    pub parent_id: Option<ItemId>,

    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create a file item with no timestamps.
    pub fn file(
        id: impl AsRef<str>,
        name: impl AsRef<str>,
        size: u64,
        parent_id: Option<&str>,
    ) -> Self {
        Self {
            id: ItemId::new(id),
            name: CompactString::new(name.as_ref()),
            kind: ItemKind::File { size },
            parent_id: parent_id.map(ItemId::new),
            modified_at: None,
            created_at: None,
        }
    }

    /// Create a folder item with no timestamps.
    pub fn folder(id: impl AsRef<str>, name: impl AsRef<str>, parent_id: Option<&str>) -> Self {
        Self {
            id: ItemId::new(id),
            name: CompactString::new(name.as_ref()),
            kind: ItemKind::Folder,
            parent_id: parent_id.map(ItemId::new),
            modified_at: None,
            created_at: None,
        }
    }

    /// Builder-style setter for the modification time.
    pub fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(at);
        self
    }

    /// Builder-style setter for the creation time.
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    #[inline]
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder)
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }

    /// Byte size for files, zero for folders.
    #[inline]
    pub fn size(&self) -> u64 {
        match self.kind {
            ItemKind::File { size } => size,
            ItemKind::Folder => 0,
        }
    }
}
