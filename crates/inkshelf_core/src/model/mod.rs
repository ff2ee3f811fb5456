//! Domain model for the document store.
//!
//! # Responsibility
//! - Define the canonical record shape for files and folders.
//! - Keep hierarchy links as arena handles, never owning pointers.
//!
//! # Invariants
//! - Every item is identified by one stable, opaque id string.
//! - Display names never contain a path separator.

pub mod item;
