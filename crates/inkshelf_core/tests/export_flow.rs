//! End-to-end export runs against temporary stores.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use inkshelf_core::{
    export_store, DocumentRenderer, DocumentStore, ExportError, ExportEvent, ExportOptions,
    RenderError, RenderResult,
};
use serde_json::json;
use tempfile::TempDir;

const DEFAULT_MODIFIED: &str = "2024-02-20T08:00:00.000000Z";

struct StaticRenderer(&'static [u8]);

impl DocumentRenderer for StaticRenderer {
    fn render(&self, _content_path: &Path, output: &mut dyn Write) -> RenderResult<()> {
        output.write_all(self.0).map_err(RenderError::Stream)
    }
}

/// Writes a few bytes and then reports failure, like a renderer dying
/// mid-document.
struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _content_path: &Path, output: &mut dyn Write) -> RenderResult<()> {
        output.write_all(b"partial").map_err(RenderError::Stream)?;
        Err(RenderError::Failed {
            program: "stub".to_string(),
            detail: "broken blob".to_string(),
        })
    }
}

/// Fails only for the content blob whose path mentions the given id.
struct SelectiveRenderer {
    fail_for_id: &'static str,
}

impl DocumentRenderer for SelectiveRenderer {
    fn render(&self, content_path: &Path, output: &mut dyn Write) -> RenderResult<()> {
        if content_path.to_string_lossy().contains(self.fail_for_id) {
            return Err(RenderError::Failed {
                program: "stub".to_string(),
                detail: "rejected".to_string(),
            });
        }
        output.write_all(b"pdf bytes").map_err(RenderError::Stream)
    }
}

fn write_record(
    dir: &Path,
    id: &str,
    name: &str,
    kind: &str,
    parent: &str,
    bookmarked: bool,
    modified: &str,
) {
    let record = json!({
        "ID": id,
        "VisibleName": name,
        "Type": kind,
        "Parent": parent,
        "Bookmarked": bookmarked,
        "ModifiedClient": modified,
    });
    fs::write(dir.join(format!("{id}.metadata")), record.to_string()).unwrap();
}

fn run_export(
    store: &DocumentStore,
    renderer: &dyn DocumentRenderer,
    target: &Path,
    options: &ExportOptions,
) -> (Result<inkshelf_core::ExportReport, ExportError>, Vec<ExportEvent>) {
    let mut events = Vec::new();
    let result = export_store(store, renderer, target, options, |event| {
        events.push(event.clone());
    });
    (result, events)
}

#[test]
fn exports_documents_into_mirrored_folders() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "f-work", "Work", "CollectionType", "", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-notes", "Notes", "DocumentType", "f-work", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-loose", "Loose", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"%PDF-1.4 stub");

    let (result, events) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    let report = result.unwrap();

    assert_eq!(report.exported, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);

    let notes = target.path().join("Work").join("Notes.pdf");
    assert_eq!(fs::read(&notes).unwrap(), b"%PDF-1.4 stub");
    assert!(target.path().join("Loose.pdf").is_file());

    let mut progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            ExportEvent::Exporting { index, total, .. } => Some((*index, *total)),
            _ => None,
        })
        .collect();
    progress.sort_unstable();
    assert_eq!(progress, [(1, 2), (2, 2)]);
}

#[test]
fn folder_changes_are_announced_once() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "f-work", "Work", "CollectionType", "", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-a", "Agenda", "DocumentType", "f-work", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-b", "Budget", "DocumentType", "f-work", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");

    let (result, events) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    result.unwrap();

    let folders: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            ExportEvent::FolderEntered { path } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(folders, [Some("Work".to_string())]);
}

#[test]
fn root_documents_are_announced_under_the_root() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-loose", "Loose", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");

    let (result, events) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    result.unwrap();

    assert!(events.contains(&ExportEvent::FolderEntered { path: None }));
}

#[test]
fn missing_target_directory_is_created_and_announced() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-1", "Doc", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let base = TempDir::new().unwrap();
    let target = base.path().join("exports").join("latest");
    let renderer = StaticRenderer(b"pdf");

    let (result, events) = run_export(&store, &renderer, &target, &ExportOptions::default());
    result.unwrap();

    assert!(target.is_dir());
    assert_eq!(
        events.first(),
        Some(&ExportEvent::TargetCreated {
            target: target.clone()
        })
    );
}

#[test]
fn empty_selection_produces_no_output() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "f-empty", "Empty", "CollectionType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");

    let (result, events) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    let report = result.unwrap();

    assert_eq!(report, inkshelf_core::ExportReport::default());
    assert!(events.is_empty());
    assert_eq!(fs::read_dir(target.path()).unwrap().count(), 0);
}

#[test]
fn output_mtime_matches_the_item_timestamp() {
    let source = TempDir::new().unwrap();
    write_record(
        source.path(),
        "d-1",
        "Doc",
        "DocumentType",
        "",
        false,
        "2023-05-10T09:30:15.123456Z",
    );

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");

    let (result, _) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    result.unwrap();

    let modified = fs::metadata(target.path().join("Doc.pdf"))
        .unwrap()
        .modified()
        .unwrap();
    let disk_secs = modified.duration_since(UNIX_EPOCH).unwrap().as_secs();
    let expected = Utc.with_ymd_and_hms(2023, 5, 10, 9, 30, 15).unwrap().timestamp() as u64;
    assert_eq!(disk_secs, expected);
}

#[test]
fn existing_outputs_are_skipped_by_default() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-1", "Doc", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();

    let first = StaticRenderer(b"first run");
    let (result, _) = run_export(&store, &first, target.path(), &ExportOptions::default());
    assert_eq!(result.unwrap().exported, 1);

    let second = StaticRenderer(b"second run");
    let (result, events) = run_export(&store, &second, target.path(), &ExportOptions::default());
    let report = result.unwrap();

    assert_eq!(report.exported, 0);
    assert_eq!(report.skipped, 1);
    assert!(events
        .iter()
        .any(|event| matches!(event, ExportEvent::SkippedExisting { .. })));
    assert_eq!(fs::read(target.path().join("Doc.pdf")).unwrap(), b"first run");
}

#[test]
fn update_rerenders_only_outdated_outputs() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-1", "Doc", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let output = target.path().join("Doc.pdf");

    let first = StaticRenderer(b"first run");
    let (result, _) = run_export(&store, &first, target.path(), &ExportOptions::default());
    assert_eq!(result.unwrap().exported, 1);

    let update = ExportOptions {
        update_existing: true,
        ..ExportOptions::default()
    };

    // Fresh output carries the item's own mtime, so nothing to do.
    let second = StaticRenderer(b"second run");
    let (result, events) = run_export(&store, &second, target.path(), &update);
    let report = result.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(events
        .iter()
        .any(|event| matches!(event, ExportEvent::SkippedUpToDate { .. })));
    assert_eq!(fs::read(&output).unwrap(), b"first run");

    // Backdate the output; now it counts as outdated.
    let item = store.tree().find_by_id("d-1").unwrap();
    let older = UNIX_EPOCH + Duration::from_secs(item.modified_at.timestamp() as u64 - 100);
    fs::File::options()
        .write(true)
        .open(&output)
        .unwrap()
        .set_modified(older)
        .unwrap();

    let third = StaticRenderer(b"third run");
    let (result, events) = run_export(&store, &third, target.path(), &update);
    let report = result.unwrap();
    assert_eq!(report.updated, 1);
    assert!(events
        .iter()
        .any(|event| matches!(event, ExportEvent::Updating { .. })));
    assert_eq!(fs::read(&output).unwrap(), b"third run");

    // The refreshed output is stamped with the item mtime again.
    let modified = fs::metadata(&output).unwrap().modified().unwrap();
    let disk_secs = modified.duration_since(UNIX_EPOCH).unwrap().as_secs();
    assert_eq!(disk_secs, item.modified_at.timestamp() as u64);
}

#[test]
fn failed_render_removes_partial_output_and_aborts() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-1", "Doc", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();

    let (result, events) = run_export(
        &store,
        &FailingRenderer,
        target.path(),
        &ExportOptions::default(),
    );

    assert!(matches!(result, Err(ExportError::Render { .. })));
    assert!(!target.path().join("Doc.pdf").exists());
    match events.last() {
        Some(ExportEvent::Failed { name, .. }) => assert_eq!(name, "Doc"),
        other => panic!("unexpected final event: {other:?}"),
    }
}

#[test]
fn ignore_errors_continues_past_failures() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-ok", "Alpha", "DocumentType", "", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-bad", "Beta", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = SelectiveRenderer {
        fail_for_id: "d-bad",
    };
    let options = ExportOptions {
        ignore_errors: true,
        ..ExportOptions::default()
    };

    let (result, events) = run_export(&store, &renderer, target.path(), &options);
    let report = result.unwrap();

    assert_eq!(report.exported, 1);
    assert_eq!(report.failed, 1);
    assert!(target.path().join("Alpha.pdf").is_file());
    assert!(!target.path().join("Beta.pdf").exists());

    let failures: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, ExportEvent::Failed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
}

#[test]
fn bookmark_filter_selects_flagged_documents_only() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-fav", "Fav", "DocumentType", "", true, DEFAULT_MODIFIED);
    write_record(source.path(), "d-plain", "Plain", "DocumentType", "", false, DEFAULT_MODIFIED);
    write_record(source.path(), "f-star", "Starred", "CollectionType", "", true, DEFAULT_MODIFIED);
    write_record(source.path(), "d-in", "Inside", "DocumentType", "f-star", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");
    let options = ExportOptions {
        only_bookmarked: true,
        ..ExportOptions::default()
    };

    let (result, _) = run_export(&store, &renderer, target.path(), &options);
    let report = result.unwrap();

    assert_eq!(report.exported, 1);
    assert!(target.path().join("Fav.pdf").is_file());
    assert!(!target.path().join("Plain.pdf").exists());
    // A bookmarked folder does not pull its plain contents in.
    assert!(!target.path().join("Starred").join("Inside.pdf").exists());
}

#[test]
fn path_prefix_filter_is_case_insensitive() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "f-work", "Work", "CollectionType", "", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-notes", "Notes", "DocumentType", "f-work", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-other", "Other", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");
    let options = ExportOptions {
        only_path_prefix: Some("/WORK/no".to_string()),
        ..ExportOptions::default()
    };

    let (result, _) = run_export(&store, &renderer, target.path(), &options);
    let report = result.unwrap();

    assert_eq!(report.exported, 1);
    assert!(target.path().join("Work").join("Notes.pdf").is_file());
    assert!(!target.path().join("Other.pdf").exists());
}

#[test]
fn pdf_named_documents_keep_a_single_suffix() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-scan", "Scan.pdf", "DocumentType", "", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");

    let (result, _) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    assert_eq!(result.unwrap().exported, 1);

    assert!(target.path().join("Scan.pdf").is_file());
    assert!(!target.path().join("Scan.pdf.pdf").exists());
}

#[test]
fn trash_documents_are_never_exported() {
    let source = TempDir::new().unwrap();
    write_record(source.path(), "d-keep", "Keep", "DocumentType", "", false, DEFAULT_MODIFIED);
    write_record(source.path(), "d-gone", "Gone", "DocumentType", "trash", false, DEFAULT_MODIFIED);

    let store = DocumentStore::open(source.path()).unwrap();
    let target = TempDir::new().unwrap();
    let renderer = StaticRenderer(b"pdf");

    let (result, _) = run_export(&store, &renderer, target.path(), &ExportOptions::default());
    let report = result.unwrap();

    assert_eq!(report.exported, 1);
    assert!(target.path().join("Keep.pdf").is_file());
    assert!(!target.path().join("Gone.pdf").exists());
}
