//! Access to one metadata store on disk.
//!
//! # Responsibility
//! - Couple a source directory with the document tree built from it.
//! - Own the `{id}.zip` content-blob naming convention.
//!
//! # Invariants
//! - The tree is rebuilt from scratch on every open and reload; there
//!   are no incremental updates.
//! - Store access never writes to the source location.

pub mod loader;
pub mod metadata;

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info};

use crate::model::item::Item;
use crate::tree::{DocumentTree, TreeError};
use loader::{scan_source, LoadError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure while opening or reloading a store.
#[derive(Debug)]
pub enum StoreError {
    /// Scanning or parsing the source directory failed.
    Load(LoadError),
    /// The loaded records do not form a valid tree.
    Tree(TreeError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(err) => write!(f, "{err}"),
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err),
            Self::Tree(err) => Some(err),
        }
    }
}

impl From<LoadError> for StoreError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<TreeError> for StoreError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

/// One opened metadata store: the source directory plus the resolved
/// document tree over its records.
#[derive(Debug)]
pub struct DocumentStore {
    source: PathBuf,
    tree: DocumentTree,
}

impl DocumentStore {
    /// Opens `source`, scanning every record and building the tree.
    pub fn open(source: impl Into<PathBuf>) -> StoreResult<Self> {
        let source = source.into();
        let tree = build_tree(&source)?;
        Ok(Self { source, tree })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// Content blob belonging to `item`, stored as `{id}.zip` next to
    /// the metadata records.
    pub fn content_path(&self, item: &Item) -> PathBuf {
        self.source.join(format!("{}.zip", item.id))
    }

    /// Discards the current tree and rebuilds it from the source.
    pub fn reload(&mut self) -> StoreResult<()> {
        self.tree = build_tree(&self.source)?;
        Ok(())
    }
}

fn build_tree(source: &Path) -> StoreResult<DocumentTree> {
    let started_at = Instant::now();
    info!(
        "event=store_open module=store status=start source={}",
        source.display()
    );

    let items = scan_source(source).map_err(|err| {
        error!("event=store_open module=store status=error detail={err}");
        StoreError::Load(err)
    })?;
    let tree = DocumentTree::build(items).map_err(|err| {
        error!("event=store_open module=store status=error detail={err}");
        StoreError::Tree(err)
    })?;

    info!(
        "event=store_open module=store status=ok duration_ms={} items={}",
        started_at.elapsed().as_millis(),
        tree.len()
    );
    Ok(tree)
}
