//! Hierarchy resolution over flat metadata records.
//!
//! # Responsibility
//! - Wire unlinked items into a navigable forest backed by an arena.
//! - Answer root, trash, traversal and path queries without mutation.
//!
//! # Invariants
//! - Items are owned by the arena only; all links are slot handles.
//! - A resolved `parent` always refers to a collection in the same
//!   arena, so traversal from the roots can never revisit an item.
//! - A build is a full recomputation; nothing survives from the links
//!   the input items may already carry.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use log::{info, warn};

use crate::model::item::{Item, ItemId, ItemKind, ItemSlot};

pub type TreeResult<T> = Result<T, TreeError>;

/// Structural failure in a loaded record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Two records share one id.
    DuplicateId(ItemId),
    /// An upward walk revisited an ancestor.
    CyclicHierarchy { id: ItemId },
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "duplicate item id `{id}`"),
            Self::CyclicHierarchy { id } => {
                write!(f, "cyclic folder hierarchy at item `{id}`")
            }
        }
    }
}

impl Error for TreeError {}

/// The resolved document forest.
///
/// Built once from loader output and immutable afterwards; a changed
/// source is picked up by building a fresh tree.
#[derive(Debug)]
pub struct DocumentTree {
    items: Vec<Item>,
    index: HashMap<ItemId, ItemSlot>,
}

impl DocumentTree {
    /// Builds the forest from unlinked items.
    ///
    /// Runs the two linking passes: index every item by id, then
    /// resolve parent references. A reference to an id that is absent
    /// or does not name a collection stays unresolved and leaves the
    /// item orphaned rather than failing the build. Duplicate ids
    /// fail the build.
    pub fn build(mut items: Vec<Item>) -> TreeResult<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if index.insert(item.id.clone(), ItemSlot(position)).is_some() {
                return Err(TreeError::DuplicateId(item.id.clone()));
            }
        }

        // Links are recomputed from scratch on every build.
        for item in items.iter_mut() {
            item.parent = None;
            item.children.clear();
        }

        let mut links = Vec::new();
        let mut unresolved = 0usize;
        for (position, item) in items.iter().enumerate() {
            let Some(parent_id) = item.parent_ref.folder_id() else {
                continue;
            };
            let Some(&parent_slot) = index.get(parent_id) else {
                unresolved += 1;
                continue;
            };
            if items[parent_slot.index()].kind != ItemKind::Collection {
                unresolved += 1;
                continue;
            }
            links.push((position, parent_slot));
        }
        for (child_position, parent_slot) in links {
            items[child_position].parent = Some(parent_slot);
            items[parent_slot.index()].children.push(ItemSlot(child_position));
        }

        if unresolved > 0 {
            warn!(
                "event=tree_build module=tree status=degraded unresolved_parents={unresolved}"
            );
        }
        info!(
            "event=tree_build module=tree status=ok items={}",
            items.len()
        );
        Ok(Self { items, index })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolves a handle issued by this tree.
    pub fn item(&self, slot: ItemSlot) -> &Item {
        &self.items[slot.index()]
    }

    /// Looks an item up by its stable id.
    pub fn find_by_id(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|slot| self.item(*slot))
    }

    /// Every loaded item in load order, trash and orphans included.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Items whose record places them at the top level, in load order.
    pub fn items_at_root(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.is_at_root())
    }

    /// Items whose record places them in the trash, in load order.
    pub fn items_in_trash(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.is_in_trash())
    }

    /// Resolved children of `item`, in load order.
    pub fn children_of<'a>(&'a self, item: &'a Item) -> impl Iterator<Item = &'a Item> + 'a {
        item.children.iter().map(move |slot| self.item(*slot))
    }

    /// Depth-first pre-order walk over everything reachable from the
    /// roots. Trash items and orphans are never yielded.
    pub fn traverse_all(&self) -> TraverseAll<'_> {
        let mut pending: Vec<ItemSlot> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_at_root())
            .map(|(position, _)| ItemSlot(position))
            .collect();
        pending.reverse();
        TraverseAll {
            tree: self,
            pending,
        }
    }

    /// Device-side path of `item`: ancestor names from the outermost
    /// folder down, joined with `/` and prefixed by `base_prefix`.
    ///
    /// A non-empty prefix gains a trailing `/` if it lacks one. The
    /// walk is iterative and refuses parent chains that loop back on
    /// themselves, which malformed records can produce.
    pub fn path(&self, item: &Item, base_prefix: &str) -> TreeResult<String> {
        let mut segments = vec![item.name.as_str()];
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(item.id.as_str());

        let mut cursor = item.parent;
        while let Some(slot) = cursor {
            let ancestor = self.item(slot);
            if !seen.insert(ancestor.id.as_str()) {
                return Err(TreeError::CyclicHierarchy {
                    id: ancestor.id.clone(),
                });
            }
            segments.push(ancestor.name.as_str());
            cursor = ancestor.parent;
        }
        segments.reverse();

        let mut path = normalize_base_prefix(base_prefix);
        path.push_str(&segments.join("/"));
        Ok(path)
    }

    /// Path of the folder containing `item`.
    ///
    /// Without a resolved parent the base prefix comes back unchanged,
    /// no trailing `/` added.
    pub fn parent_folder_path(&self, item: &Item, base_prefix: &str) -> TreeResult<String> {
        match item.parent {
            Some(slot) => self.path(self.item(slot), base_prefix),
            None => Ok(base_prefix.to_string()),
        }
    }
}

fn normalize_base_prefix(base_prefix: &str) -> String {
    if base_prefix.is_empty() || base_prefix.ends_with('/') {
        base_prefix.to_string()
    } else {
        format!("{base_prefix}/")
    }
}

/// Lazy depth-first pre-order traversal over the root forest.
///
/// Yields a folder before its contents and siblings in load order.
/// Driven by an explicit stack; nesting depth never grows the call
/// stack.
pub struct TraverseAll<'tree> {
    tree: &'tree DocumentTree,
    pending: Vec<ItemSlot>,
}

impl<'tree> Iterator for TraverseAll<'tree> {
    type Item = &'tree Item;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.pending.pop()?;
        let item = self.tree.item(slot);
        self.pending.extend(item.children.iter().rev().copied());
        Some(item)
    }
}
