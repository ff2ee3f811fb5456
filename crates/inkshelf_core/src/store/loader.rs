//! Directory scanner for metadata records.
//!
//! # Responsibility
//! - Enumerate `.metadata` files in one source directory.
//! - Parse each record into an unlinked [`Item`], in scan order.
//!
//! # Invariants
//! - Directory entries without the `.metadata` extension are skipped,
//!   never reported as errors.
//! - A record that fails to parse aborts the scan and names its file.
//! - Scanning never writes to the source location.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::model::item::Item;
use crate::store::metadata::{parse_record, MetadataError};

const METADATA_EXTENSION: &str = "metadata";

pub type LoadResult<T> = Result<T, LoadError>;

/// Failure while scanning a metadata source directory.
#[derive(Debug)]
pub enum LoadError {
    /// The directory or one of its files could not be read.
    Io { path: PathBuf, source: io::Error },
    /// One record failed structural parsing.
    Record {
        path: PathBuf,
        source: MetadataError,
    },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read metadata source `{}`: {source}", path.display())
            }
            Self::Record { path, source } => {
                write!(f, "invalid metadata record `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Record { source, .. } => Some(source),
        }
    }
}

/// Scans `source` and parses every eligible record.
///
/// Returns items in directory scan order; that order becomes the load
/// order of the tree built from them.
pub fn scan_source(source: &Path) -> LoadResult<Vec<Item>> {
    let entries = fs::read_dir(source).map_err(|err| LoadError::Io {
        path: source.to_path_buf(),
        source: err,
    })?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| LoadError::Io {
            path: source.to_path_buf(),
            source: err,
        })?;
        let path = entry.path();
        if !is_metadata_file(&path) {
            continue;
        }
        let raw = fs::read_to_string(&path).map_err(|err| LoadError::Io {
            path: path.clone(),
            source: err,
        })?;
        let item = parse_record(&raw).map_err(|err| LoadError::Record {
            path: path.clone(),
            source: err,
        })?;
        items.push(item);
    }

    debug!(
        "event=scan_source module=loader status=ok records={} source={}",
        items.len(),
        source.display()
    );
    Ok(items)
}

fn is_metadata_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == METADATA_EXTENSION)
}
