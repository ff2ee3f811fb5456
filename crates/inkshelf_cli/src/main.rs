//! Command-line interface over a document store.
//!
//! Subcommands mirror the library surface: `tree` prints the folder
//! hierarchy, `paths` lists `id: path` lines, `stats` summarizes
//! folder sizes and `export` renders documents to PDF files.

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process;

use log::debug;

use inkshelf_core::{
    export_store, init_logging, CommandRenderer, DocumentStore, DocumentTree, ExportError,
    ExportEvent, ExportOptions, Item, StoreError, TreeError,
};

const USAGE: &str = "\
Usage: inkshelf [-v] <command> [arguments]

Commands:
  tree <source>             Print the folder tree of the store
  paths <source>            Print one `id: path` line per item
  stats <source>            Print per-folder statistics
  export <source> <target> [flags]
                            Render documents into <target> as PDF files

Export flags:
  -b, --only-bookmarked         Export bookmarked documents only
  -f, --only-path-prefix <pfx>  Export documents whose path starts with
                                <pfx> (case-insensitive)
  -u, --update                  Re-render files whose export is outdated
  -i, --ignore-errors           Continue after per-document failures
      --renderer <program>      Renderer program to invoke (default: rmrl)

Global flags:
  -v, --verbose                 Verbose diagnostics on stderr
  -h, --help                    Show this help
      --version                 Show version
";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    process::exit(run(args));
}

enum CliError {
    /// The invocation itself is wrong; exits 2 after showing usage.
    Usage(String),
    /// The command ran and failed; exits 1.
    Fatal(Box<dyn Error>),
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Fatal(Box::new(err))
    }
}

impl From<TreeError> for CliError {
    fn from(err: TreeError) -> Self {
        Self::Fatal(Box::new(err))
    }
}

impl From<ExportError> for CliError {
    fn from(err: ExportError) -> Self {
        Self::Fatal(Box::new(err))
    }
}

fn run(mut args: Vec<String>) -> i32 {
    let mut verbose = false;
    args.retain(|arg| match arg.as_str() {
        "-v" | "--verbose" => {
            verbose = true;
            false
        }
        _ => true,
    });

    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print!("{USAGE}");
        return 0;
    }
    if args.iter().any(|arg| arg == "--version") {
        println!("inkshelf {}", env!("CARGO_PKG_VERSION"));
        return 0;
    }

    if let Err(err) = init_logging(if verbose { "debug" } else { "warn" }) {
        eprintln!("WARN: logging unavailable: {err}");
    }

    let Some(command) = args.first().cloned() else {
        eprint!("{USAGE}");
        return 2;
    };
    debug!("event=cli module=cli command={command}");

    let outcome = match command.as_str() {
        "tree" => run_tree(&args[1..]),
        "paths" => run_paths(&args[1..]),
        "stats" => run_stats(&args[1..]),
        "export" => run_export(&args[1..]),
        unknown => Err(CliError::Usage(format!("unknown command `{unknown}`"))),
    };

    match outcome {
        Ok(()) => 0,
        Err(CliError::Usage(message)) => {
            eprintln!("ERROR: {message}");
            eprintln!();
            eprint!("{USAGE}");
            2
        }
        Err(CliError::Fatal(err)) => {
            eprintln!("ERROR: {err}");
            eprintln!();
            eprintln!("Check that the metadata source directory exists and is readable.");
            1
        }
    }
}

fn single_source_arg(args: &[String], command: &str) -> Result<PathBuf, CliError> {
    match args {
        [source] => Ok(PathBuf::from(source)),
        _ => Err(CliError::Usage(format!(
            "`{command}` takes exactly one argument: the metadata source directory"
        ))),
    }
}

fn run_tree(args: &[String]) -> Result<(), CliError> {
    let source = single_source_arg(args, "tree")?;
    let store = DocumentStore::open(source)?;
    println!("Document tree:");
    let roots: Vec<&Item> = store.tree().items_at_root().collect();
    for line in tree_lines(store.tree(), &roots) {
        println!("{line}");
    }
    Ok(())
}

/// Renders the box-drawing tree, one line per item, with `<empty>`
/// markers for childless folders. Walks with an explicit stack so the
/// hierarchy depth never grows the call stack.
fn tree_lines(tree: &DocumentTree, roots: &[&Item]) -> Vec<String> {
    let mut lines = Vec::new();
    if roots.is_empty() {
        lines.push("└── <empty>".to_string());
        return lines;
    }

    let mut pending: Vec<(&Item, String, bool)> = Vec::new();
    for (position, &item) in roots.iter().enumerate().rev() {
        pending.push((item, String::new(), position + 1 == roots.len()));
    }

    while let Some((item, prefix, last)) = pending.pop() {
        let connector = if last { "└── " } else { "├── " };
        lines.push(format!("{prefix}{connector}{}", item.name));
        if !item.is_folder() {
            continue;
        }
        let deeper = if last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };
        let children: Vec<&Item> = tree.children_of(item).collect();
        if children.is_empty() {
            lines.push(format!("{deeper}└── <empty>"));
            continue;
        }
        let total = children.len();
        for (position, child) in children.into_iter().enumerate().rev() {
            pending.push((child, deeper.clone(), position + 1 == total));
        }
    }
    lines
}

fn run_paths(args: &[String]) -> Result<(), CliError> {
    let source = single_source_arg(args, "paths")?;
    let store = DocumentStore::open(source)?;
    let tree = store.tree();
    println!("IDs:");
    for item in tree.iter().filter(|item| !item.is_in_trash()) {
        let path = tree.path(item, "")?;
        println!("{}: {path}", item.id);
    }
    Ok(())
}

fn run_stats(args: &[String]) -> Result<(), CliError> {
    let source = single_source_arg(args, "stats")?;
    let store = DocumentStore::open(source)?;
    let counts: Vec<usize> = store
        .tree()
        .traverse_all()
        .filter(|item| item.is_folder())
        .map(|folder| folder.children.len())
        .collect();

    if counts.is_empty() {
        println!("No folders in the store.");
        return Ok(());
    }

    let total: usize = counts.iter().sum();
    println!("Items per folder:");
    println!("{:<10} {:>8} {:>8} {:>8}", "FOLDERS", "MEAN", "MEDIAN", "ITEMS");
    println!(
        "{:<10} {:>8.1} {:>8.1} {:>8}",
        counts.len(),
        mean(&counts),
        median(&counts),
        total
    );
    Ok(())
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

fn median(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    }
}

struct ExportArgs {
    source: PathBuf,
    target: PathBuf,
    options: ExportOptions,
    renderer: String,
}

fn parse_export_args(args: &[String]) -> Result<ExportArgs, String> {
    let mut positional: Vec<&String> = Vec::new();
    let mut options = ExportOptions::default();
    let mut renderer = CommandRenderer::DEFAULT_PROGRAM.to_string();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-b" | "--only-bookmarked" => options.only_bookmarked = true,
            "-u" | "--update" => options.update_existing = true,
            "-i" | "--ignore-errors" => options.ignore_errors = true,
            "-f" | "--only-path-prefix" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "`--only-path-prefix` needs a value".to_string())?;
                options.only_path_prefix = Some(value.clone());
            }
            "--renderer" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "`--renderer` needs a value".to_string())?;
                renderer = value.clone();
            }
            flag if flag.starts_with('-') => {
                return Err(format!("unknown export flag `{flag}`"));
            }
            _ => positional.push(arg),
        }
    }

    match positional.as_slice() {
        [source, target] => Ok(ExportArgs {
            source: PathBuf::from(source.as_str()),
            target: PathBuf::from(target.as_str()),
            options,
            renderer,
        }),
        _ => Err("`export` takes exactly two arguments: source and target".to_string()),
    }
}

fn run_export(args: &[String]) -> Result<(), CliError> {
    let parsed = parse_export_args(args).map_err(CliError::Usage)?;
    let store = DocumentStore::open(&parsed.source)?;
    let renderer = CommandRenderer::new(parsed.renderer);

    let report = export_store(
        &store,
        &renderer,
        &parsed.target,
        &parsed.options,
        print_export_event,
    )?;
    println!(
        "Done: {} exported, {} updated, {} skipped, {} failed.",
        report.exported, report.updated, report.skipped, report.failed
    );
    Ok(())
}

fn print_export_event(event: &ExportEvent) {
    match event {
        ExportEvent::TargetCreated { target } => {
            println!("INFO: Created target directory `{}`", target.display());
        }
        ExportEvent::FolderEntered { path } => {
            println!("INFO: Current folder: {}", path.as_deref().unwrap_or("<root>"));
        }
        ExportEvent::Exporting { index, total, name } => {
            println!("INFO: [{index}/{total}] Exporting '{name}'...");
        }
        ExportEvent::Updating { index, total, name } => {
            println!("INFO: [{index}/{total}] Updating '{name}'...");
        }
        ExportEvent::SkippedExisting { index, total, name } => {
            println!("INFO: [{index}/{total}] Skipping '{name}', already exported");
        }
        ExportEvent::SkippedUpToDate { index, total, name } => {
            println!("INFO: [{index}/{total}] Skipping '{name}', up to date");
        }
        ExportEvent::Failed {
            index,
            total,
            name,
            detail,
        } => {
            eprintln!("ERROR: [{index}/{total}] Failed to export '{name}': {detail}");
        }
    }
}
