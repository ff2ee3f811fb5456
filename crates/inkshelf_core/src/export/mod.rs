//! Batch export of documents into a target directory as PDF files.
//!
//! # Responsibility
//! - Select exportable documents, honoring bookmark and path filters.
//! - Decide per file whether to render, re-render or skip.
//! - Report progress through a caller-supplied event callback.
//!
//! # Invariants
//! - The folder structure under the target mirrors device paths.
//! - An output file's mtime equals the item's `modified_at`; staleness
//!   is compared at whole-second precision.
//! - A failed item never leaves partial output behind.

pub mod renderer;

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use log::{error, info};

use crate::model::item::Item;
use crate::store::DocumentStore;
use crate::tree::TreeError;
use renderer::{DocumentRenderer, RenderError};

const PDF_SUFFIX: &str = ".pdf";

pub type ExportResult<T> = Result<T, ExportError>;

/// Failure while exporting a store.
#[derive(Debug)]
pub enum ExportError {
    /// Path computation failed; the hierarchy itself is unusable.
    Tree(TreeError),
    /// A directory or output file could not be written.
    Io { path: PathBuf, source: io::Error },
    /// The renderer failed for one document.
    Render { name: String, source: RenderError },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "cannot write export output `{}`: {source}", path.display())
            }
            Self::Render { name, source } => {
                write!(f, "failed to render `{name}`: {source}")
            }
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Render { source, .. } => Some(source),
        }
    }
}

impl From<TreeError> for ExportError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

/// Options controlling document selection and re-export behavior.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Export only bookmarked documents.
    pub only_bookmarked: bool,
    /// Keep only documents whose device path starts with this prefix,
    /// compared case-insensitively. A single leading `/` is ignored.
    pub only_path_prefix: Option<String>,
    /// Re-render outputs whose mtime is older than the item.
    pub update_existing: bool,
    /// Continue with the next document after a per-item failure.
    pub ignore_errors: bool,
}

/// Progress notification emitted while an export runs.
///
/// Indexes are 1-based over the selected document count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    /// The target directory did not exist and was created.
    TargetCreated { target: PathBuf },
    /// Work moved to a different source folder; `None` is the root.
    FolderEntered { path: Option<String> },
    Exporting {
        index: usize,
        total: usize,
        name: String,
    },
    Updating {
        index: usize,
        total: usize,
        name: String,
    },
    SkippedExisting {
        index: usize,
        total: usize,
        name: String,
    },
    SkippedUpToDate {
        index: usize,
        total: usize,
        name: String,
    },
    Failed {
        index: usize,
        total: usize,
        name: String,
        detail: String,
    },
}

/// Outcome counters of one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Action {
    Fresh,
    Update,
    SkipExisting,
    SkipUpToDate,
}

/// Exports every selected document of `store` under `target`.
///
/// Documents are visited in traversal order, so one folder's files are
/// handled together. Trash content is never exported.
pub fn export_store(
    store: &DocumentStore,
    renderer: &dyn DocumentRenderer,
    target: &Path,
    options: &ExportOptions,
    mut on_event: impl FnMut(&ExportEvent),
) -> ExportResult<ExportReport> {
    let started_at = Instant::now();
    let tree = store.tree();

    if !target.exists() {
        fs::create_dir_all(target).map_err(|source| ExportError::Io {
            path: target.to_path_buf(),
            source,
        })?;
        on_event(&ExportEvent::TargetCreated {
            target: target.to_path_buf(),
        });
    }

    let prefix = normalize_path_prefix(options.only_path_prefix.as_deref());
    let mut selected: Vec<(&Item, String)> = Vec::new();
    for item in tree.traverse_all() {
        if item.is_folder() {
            continue;
        }
        if options.only_bookmarked && !item.bookmarked {
            continue;
        }
        let device_path = tree.path(item, "")?;
        if let Some(prefix) = prefix.as_deref() {
            if !device_path.to_lowercase().starts_with(prefix) {
                continue;
            }
        }
        selected.push((item, device_path));
    }

    let total = selected.len();
    info!(
        "event=export module=export status=start total={total} target={}",
        target.display()
    );

    let mut report = ExportReport::default();
    let mut last_folder: Option<Option<String>> = None;

    for (position, (item, device_path)) in selected.iter().enumerate() {
        let index = position + 1;

        let folder = tree.parent_folder_path(item, "")?;
        let folder_label = if folder.is_empty() { None } else { Some(folder) };
        if last_folder.as_ref() != Some(&folder_label) {
            on_event(&ExportEvent::FolderEntered {
                path: folder_label.clone(),
            });
            last_folder = Some(folder_label);
        }

        let output_path = output_file_path(target, device_path);
        let action = match decide_action(&output_path, item, options.update_existing) {
            Ok(action) => action,
            Err(err) => {
                error!("event=export module=export status=error item={} detail={err}", item.id);
                report.failed += 1;
                on_event(&ExportEvent::Failed {
                    index,
                    total,
                    name: item.name.clone(),
                    detail: err.to_string(),
                });
                if options.ignore_errors {
                    continue;
                }
                return Err(err);
            }
        };

        let updating = match action {
            Action::SkipExisting => {
                report.skipped += 1;
                on_event(&ExportEvent::SkippedExisting {
                    index,
                    total,
                    name: item.name.clone(),
                });
                continue;
            }
            Action::SkipUpToDate => {
                report.skipped += 1;
                on_event(&ExportEvent::SkippedUpToDate {
                    index,
                    total,
                    name: item.name.clone(),
                });
                continue;
            }
            Action::Fresh => {
                on_event(&ExportEvent::Exporting {
                    index,
                    total,
                    name: item.name.clone(),
                });
                false
            }
            Action::Update => {
                on_event(&ExportEvent::Updating {
                    index,
                    total,
                    name: item.name.clone(),
                });
                true
            }
        };

        match render_to_file(store, renderer, item, &output_path) {
            Ok(()) => {
                if updating {
                    report.updated += 1;
                } else {
                    report.exported += 1;
                }
            }
            Err(err) => {
                discard_partial_output(&output_path);
                error!("event=export module=export status=error item={} detail={err}", item.id);
                report.failed += 1;
                on_event(&ExportEvent::Failed {
                    index,
                    total,
                    name: item.name.clone(),
                    detail: err.to_string(),
                });
                if !options.ignore_errors {
                    return Err(err);
                }
            }
        }
    }

    info!(
        "event=export module=export status=ok duration_ms={} exported={} updated={} skipped={} failed={}",
        started_at.elapsed().as_millis(),
        report.exported,
        report.updated,
        report.skipped,
        report.failed
    );
    Ok(report)
}

/// Chooses what to do about one output file.
fn decide_action(output_path: &Path, item: &Item, update_existing: bool) -> ExportResult<Action> {
    if !output_path.exists() {
        return Ok(Action::Fresh);
    }
    if !update_existing {
        return Ok(Action::SkipExisting);
    }
    let disk_modified = fs::metadata(output_path)
        .and_then(|meta| meta.modified())
        .map_err(|source| ExportError::Io {
            path: output_path.to_path_buf(),
            source,
        })?;
    let disk_secs = disk_modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_secs() as i64)
        .unwrap_or(0);
    if disk_secs < item.modified_at.timestamp() {
        Ok(Action::Update)
    } else {
        Ok(Action::SkipUpToDate)
    }
}

/// Renders `item` into `output_path` and stamps the item's mtime on it.
fn render_to_file(
    store: &DocumentStore,
    renderer: &dyn DocumentRenderer,
    item: &Item,
    output_path: &Path,
) -> ExportResult<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut file = File::create(output_path).map_err(|source| ExportError::Io {
        path: output_path.to_path_buf(),
        source,
    })?;
    renderer
        .render(&store.content_path(item), &mut file)
        .map_err(|source| ExportError::Render {
            name: item.name.clone(),
            source,
        })?;
    file.set_modified(SystemTime::from(item.modified_at))
        .map_err(|source| ExportError::Io {
            path: output_path.to_path_buf(),
            source,
        })?;
    Ok(())
}

fn discard_partial_output(path: &Path) {
    if path.exists() {
        let _ = fs::remove_file(path);
    }
}

/// Output location for a document: the device path under `target`,
/// with `.pdf` appended unless the name already ends with it.
fn output_file_path(target: &Path, device_path: &str) -> PathBuf {
    if device_path.ends_with(PDF_SUFFIX) {
        target.join(device_path)
    } else {
        target.join(format!("{device_path}{PDF_SUFFIX}"))
    }
}

fn normalize_path_prefix(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.strip_prefix('/').unwrap_or(raw);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_suffix_is_appended_once() {
        let target = Path::new("/out");
        assert_eq!(
            output_file_path(target, "A/Notes"),
            PathBuf::from("/out/A/Notes.pdf")
        );
        assert_eq!(
            output_file_path(target, "A/Scan.pdf"),
            PathBuf::from("/out/A/Scan.pdf")
        );
    }

    #[test]
    fn path_prefix_is_lowercased_and_slash_trimmed() {
        assert_eq!(normalize_path_prefix(None), None);
        assert_eq!(normalize_path_prefix(Some("/")), None);
        assert_eq!(normalize_path_prefix(Some("")), None);
        assert_eq!(
            normalize_path_prefix(Some("/Work/Projects")),
            Some("work/projects".to_string())
        );
        assert_eq!(
            normalize_path_prefix(Some("Work")),
            Some("work".to_string())
        );
    }
}
