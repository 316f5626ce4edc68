//! Error types for the pdf-splitter library.
//!
//! Three error types reflect three distinct blast radii:
//!
//! * [`SplitterError`] — **Fatal**: the run cannot start or cannot finish
//!   (bad input file, corrupt PDF, invalid configuration, pdfium missing).
//!   Returned as `Err(SplitterError)` from the top-level entry points.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk could not be written or
//!   converted. Captured into the chunk's
//!   [`crate::output::ConversionResult`] (or the write report) so every
//!   other chunk still runs to completion.
//!
//! * [`MergeError`] — the per-chunk documents could not be reassembled.
//!   Fatal for the run, but carried inside [`crate::output::PipelineOutcome`]
//!   so the caller still gets the conversion results and validation report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-splitter library.
#[derive(Debug, Error)]
pub enum SplitterError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the directory that receives chunk files.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a results or merged-document file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted results file could not be read back.
    #[error("Failed to read results file '{path}': {detail}")]
    ResultsUnreadable { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// Serialisable so it can travel in write reports and progress events.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The chunk PDF could not be written.
    #[error("Chunk {ordinal}: failed to write '{path}': {detail}")]
    ArtifactWrite {
        ordinal: usize,
        path: PathBuf,
        detail: String,
    },

    /// The conversion service reported a failure.
    #[error("Chunk {ordinal}: conversion failed: {detail}")]
    Conversion { ordinal: usize, detail: String },

    /// The worker process hosting the conversion faulted.
    #[error("Chunk {ordinal}: worker fault: {detail}")]
    WorkerFault { ordinal: usize, detail: String },

    /// The conversion exceeded its deadline.
    #[error("Chunk {ordinal}: conversion timed out after {secs}s")]
    Timeout { ordinal: usize, secs: u64 },
}

impl ChunkError {
    /// The ordinal of the chunk this error belongs to.
    pub fn ordinal(&self) -> usize {
        match self {
            ChunkError::ArtifactWrite { ordinal, .. }
            | ChunkError::Conversion { ordinal, .. }
            | ChunkError::WorkerFault { ordinal, .. }
            | ChunkError::Timeout { ordinal, .. } => *ordinal,
        }
    }
}

/// Reassembly failures. Both variants end the run's merge stage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MergeError {
    /// No successful conversion result carried a document.
    #[error("No valid documents to merge ({total} results, all failed or empty)")]
    NoValidInput { total: usize },

    /// A fold step could not reconcile two documents.
    #[error("Merge conflict at chunk {ordinal}: {reason}")]
    Conflict { ordinal: usize, reason: String },
}

/// The outline of a PDF could not be read; planning falls back to the fixed
/// sweep. Never escapes the planning stage.
#[derive(Debug, Clone, Error)]
#[error("Outline unreadable: {0}")]
pub struct PlanningError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_error_display_names_ordinal() {
        let e = ChunkError::WorkerFault {
            ordinal: 7,
            detail: "exited with signal 9".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Chunk 7"), "got: {msg}");
        assert!(msg.contains("signal 9"));
        assert_eq!(e.ordinal(), 7);
    }

    #[test]
    fn timeout_display() {
        let e = ChunkError::Timeout {
            ordinal: 2,
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn merge_conflict_display() {
        let e = MergeError::Conflict {
            ordinal: 3,
            reason: "schema mismatch".into(),
        };
        assert!(e.to_string().contains("chunk 3"));
        assert!(e.to_string().contains("schema mismatch"));
    }

    #[test]
    fn no_valid_input_display() {
        let e = MergeError::NoValidInput { total: 4 };
        assert!(e.to_string().contains("4 results"));
    }

    #[test]
    fn chunk_error_round_trips_through_json() {
        let e = ChunkError::Conversion {
            ordinal: 1,
            detail: "bad table".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ChunkError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
