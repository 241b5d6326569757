/// Data model for drive snapshots.
///
/// Re-exports the item records, the indexed store and size formatting.
pub mod item;
pub mod size;
pub mod store;

pub use item::{Item, ItemId, ItemKind, ScopeId};
pub use store::{ItemStore, NodeIndex};
