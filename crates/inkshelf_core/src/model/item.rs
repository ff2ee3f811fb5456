//! One file or folder as described by its metadata record.
//!
//! # Responsibility
//! - Carry the normalized fields of a single metadata record.
//! - Hold the resolved hierarchy links filled in by the tree build.
//!
//! # Invariants
//! - `name` never contains `/`; the constructor strips it.
//! - `parent` and `children` are meaningful only inside the tree that
//!   produced them and are reset by every rebuild.
//! - `children` is populated only for `ItemKind::Collection`.

use chrono::{DateTime, Utc};

/// Stable identifier of an item, supplied by the producing device.
///
/// The value is opaque text; nothing in this crate assumes a format
/// beyond uniqueness within one loaded record set.
pub type ItemId = String;

/// Arena handle of one item inside a built [`DocumentTree`].
///
/// Handles are plain indexes under the hood and stay valid for the
/// lifetime of the tree that issued them. A handle from one tree must
/// not be used against another.
///
/// [`DocumentTree`]: crate::tree::DocumentTree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemSlot(pub(crate) usize);

impl ItemSlot {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Whether a record describes a document or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// A leaf document with an associated content blob.
    Document,
    /// A folder that can hold other items.
    Collection,
}

/// Where a record claims to live, before hierarchy resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// Top level of the document tree.
    Root,
    /// The device trash; items here are kept out of normal traversal.
    Trash,
    /// Nested under the folder with this id.
    Folder(ItemId),
}

impl ParentRef {
    /// Maps the raw `Parent` metadata value onto the typed reference.
    ///
    /// The empty string means root and the literal `trash` means trash;
    /// every other value is taken as a parent folder id.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "" => Self::Root,
            "trash" => Self::Trash,
            other => Self::Folder(other.to_string()),
        }
    }

    /// Returns the referenced folder id, if any.
    pub fn folder_id(&self) -> Option<&str> {
        match self {
            Self::Folder(id) => Some(id),
            _ => None,
        }
    }
}

/// A single file or folder from the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Opaque stable id; the join key between records.
    pub id: ItemId,
    /// Display name with path separators stripped.
    pub name: String,
    /// Document or collection.
    pub kind: ItemKind,
    /// Raw placement claim from the record.
    pub parent_ref: ParentRef,
    /// Favourite flag from the device UI.
    pub bookmarked: bool,
    /// Client-side modification time, fractional seconds preserved.
    pub modified_at: DateTime<Utc>,
    /// Resolved parent handle; `None` at root, in trash or when the
    /// referenced parent cannot be resolved.
    pub parent: Option<ItemSlot>,
    /// Resolved child handles in load order.
    pub children: Vec<ItemSlot>,
}

impl Item {
    /// Creates an unlinked item. `/` is stripped from `name` so that a
    /// display name can always be used as one path segment.
    pub fn new(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        kind: ItemKind,
        parent_ref: ParentRef,
        bookmarked: bool,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: sanitize_name(&name.into()),
            kind,
            parent_ref,
            bookmarked,
            modified_at,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Collection
    }

    pub fn is_at_root(&self) -> bool {
        matches!(self.parent_ref, ParentRef::Root)
    }

    pub fn is_in_trash(&self) -> bool {
        matches!(self.parent_ref, ParentRef::Trash)
    }
}

/// Removes path separators from a display name.
fn sanitize_name(raw: &str) -> String {
    raw.replace('/', "")
}
