//! Core library for working with a device document store.
//!
//! The store is a flat directory of JSON metadata records, one per
//! document or folder. This crate parses those records, resolves them
//! into a navigable folder tree and drives PDF export of document
//! content through an external renderer.
//!
//! Modules:
//! - `model`: item record shape and hierarchy handle types.
//! - `store`: directory scanning, record decoding, store lifecycle.
//! - `tree`: hierarchy resolution, traversal and path computation.
//! - `export`: batch PDF export and the renderer boundary.
//! - `logging`: process-wide logging bootstrap.

pub mod export;
pub mod logging;
pub mod model;
pub mod store;
pub mod tree;

pub use export::renderer::{CommandRenderer, DocumentRenderer, RenderError, RenderResult};
pub use export::{
    export_store, ExportError, ExportEvent, ExportOptions, ExportReport, ExportResult,
};
pub use logging::init_logging;
pub use model::item::{Item, ItemId, ItemKind, ItemSlot, ParentRef};
pub use store::loader::{scan_source, LoadError, LoadResult};
pub use store::metadata::{parse_record, MetadataError, MetadataResult};
pub use store::{DocumentStore, StoreError, StoreResult};
pub use tree::{DocumentTree, TraverseAll, TreeError, TreeResult};
