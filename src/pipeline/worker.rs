//! The conversion-service seam and the worker side of the process protocol.
//!
//! [`ChunkConverter`] is the only thing the pipeline knows about document
//! conversion. [`CommandConverter`] adapts any external program that prints
//! a structured document as JSON; tests and embedders plug in their own
//! implementations.
//!
//! A worker process speaks JSON lines:
//!
//! ```text
//! stdin : {"chunk_path":"/tmp/pdf_chunks_x/chunk_0000_pages_0000_0045.pdf"}
//! stdout: {"success":true,"document":{...},"error":null}
//! ```
//!
//! One reply per request, in request order. The worker exits on EOF.

use crate::document::StructuredDocument;
use crate::error::SplitterError;
use crate::output::ConversionOutcome;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Converts one chunk PDF into a structured document.
///
/// Implementations must not let a failure escape as a panic if they can
/// help it; report it through [`ConversionOutcome::failed`]. Panics are
/// still contained by the orchestrator.
pub trait ChunkConverter: Send + Sync {
    fn convert(&self, chunk_path: &Path) -> ConversionOutcome;
}

/// Runs `program [args..] <chunk_path>` and parses stdout as a
/// [`StructuredDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line, e.g. `"docling --to json"`.
    pub fn from_command_line(command_line: &str) -> Result<Self, SplitterError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SplitterError::InvalidConfig("converter command is empty".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ChunkConverter for CommandConverter {
    fn convert(&self, chunk_path: &Path) -> ConversionOutcome {
        debug!("Running '{}' on {}", self.program, chunk_path.display());

        let output = match Command::new(&self.program)
            .args(&self.args)
            .arg(chunk_path)
            .stdin(Stdio::null())
            .output()
        {
            Ok(o) => o,
            Err(e) => return ConversionOutcome::failed(format!("cannot run '{}': {e}", self.program)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return ConversionOutcome::failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                last_line.trim()
            ));
        }

        match serde_json::from_slice::<StructuredDocument>(&output.stdout) {
            Ok(mut doc) => {
                if doc.name.is_empty() {
                    doc.name = chunk_path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                }
                ConversionOutcome::ok(doc)
            }
            Err(e) => ConversionOutcome::failed(format!(
                "'{}' printed an unreadable document: {e}",
                self.program
            )),
        }
    }
}

/// One line on a worker's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub chunk_path: PathBuf,
}

/// Serve requests from `input` until EOF, writing one reply line each.
///
/// Returns the number of requests handled. A malformed request gets a
/// failed reply rather than ending the loop.
pub fn serve_worker<R: BufRead, W: Write>(
    converter: &dyn ChunkConverter,
    input: R,
    mut output: W,
) -> io::Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let outcome = match serde_json::from_str::<WorkerRequest>(&line) {
            Ok(req) => converter.convert(&req.chunk_path),
            Err(e) => {
                warn!("Malformed worker request: {e}");
                ConversionOutcome::failed(format!("malformed request: {e}"))
            }
        };

        serde_json::to_writer(&mut output, &outcome)?;
        output.write_all(b"\n")?;
        output.flush()?;
        handled += 1;
    }
    Ok(handled)
}
