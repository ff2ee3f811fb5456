//! External renderer boundary.
//!
//! # Responsibility
//! - Define the seam through which content blobs become PDF bytes.
//! - Provide the default implementation shelling out to a program.
//!
//! # Contract
//! - A renderer either writes complete output and returns `Ok`, or
//!   returns an error; there is no partial-success state.
//! - The content blob is never modified.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

const STDERR_DETAIL_LIMIT: usize = 400;

pub type RenderResult<T> = Result<T, RenderError>;

/// Failure while rendering one content blob.
#[derive(Debug)]
pub enum RenderError {
    /// The renderer process could not be started or awaited.
    Launch { program: String, source: io::Error },
    /// Streaming renderer output to the destination failed.
    Stream(io::Error),
    /// The renderer exited unsuccessfully.
    Failed { program: String, detail: String },
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { program, source } => {
                write!(f, "cannot run renderer `{program}`: {source}")
            }
            Self::Stream(err) => write!(f, "renderer output stream failed: {err}"),
            Self::Failed { program, detail } => {
                write!(f, "renderer `{program}` failed: {detail}")
            }
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Launch { source, .. } => Some(source),
            Self::Stream(err) => Some(err),
            Self::Failed { .. } => None,
        }
    }
}

/// Turns one content blob into a PDF byte stream.
pub trait DocumentRenderer {
    fn render(&self, content_path: &Path, output: &mut dyn Write) -> RenderResult<()>;
}

/// Renderer invoking an external program.
///
/// The program receives the content path as its final argument and is
/// expected to write the PDF to stdout. The default `rmrl` follows
/// this contract; any compatible program can be substituted.
pub struct CommandRenderer {
    program: String,
}

impl CommandRenderer {
    pub const DEFAULT_PROGRAM: &'static str = "rmrl";

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandRenderer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

impl DocumentRenderer for CommandRenderer {
    fn render(&self, content_path: &Path, output: &mut dyn Write) -> RenderResult<()> {
        let mut child = Command::new(&self.program)
            .arg(content_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // Drained on its own thread; a renderer that fills the stderr
        // pipe before closing stdout would otherwise stall the copy
        // below and hang the run.
        let stderr_drain = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        if let Some(mut stdout) = child.stdout.take() {
            if let Err(err) = io::copy(&mut stdout, output) {
                let _ = child.kill();
                let _ = child.wait();
                if let Some(drain) = stderr_drain {
                    let _ = drain.join();
                }
                return Err(RenderError::Stream(err));
            }
        }

        let status = child.wait().map_err(|source| RenderError::Launch {
            program: self.program.clone(),
            source,
        })?;
        let stderr_text = stderr_drain
            .and_then(|drain| drain.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(RenderError::Failed {
                program: self.program.clone(),
                detail: failure_detail(&status.to_string(), &stderr_text),
            });
        }
        Ok(())
    }
}

/// Collapses renderer stderr into a single capped line of detail.
fn failure_detail(status: &str, stderr_text: &str) -> String {
    let flattened = stderr_text
        .trim()
        .replace(['\n', '\r'], " ");
    if flattened.is_empty() {
        return status.to_string();
    }
    let mut detail: String = flattened.chars().take(STDERR_DETAIL_LIMIT).collect();
    if flattened.chars().count() > STDERR_DETAIL_LIMIT {
        detail.push_str("...");
    }
    format!("{status}: {detail}")
}
