//! Data types that flow between pipeline stages and out to callers.

use crate::document::StructuredDocument;
use crate::error::{ChunkError, MergeError};
use crate::pipeline::plan::{OutlineEntry, SplitPlan};
use crate::pipeline::split::WriteReport;
use crate::pipeline::validate::ValidationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A contiguous, zero-based, half-open page range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Boundary {
    pub start: usize,
    pub end: usize,
}

impl Boundary {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of pages in the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, page: usize) -> bool {
        page >= self.start && page < self.end
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<(usize, usize)> for Boundary {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// A chunk PDF written to disk, with the range it was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkArtifact {
    /// Position in the boundary list.
    pub ordinal: usize,
    pub boundary: Boundary,
    pub path: PathBuf,
}

impl ChunkArtifact {
    /// File name of the artifact, for log lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// What the conversion service returns for one chunk.
///
/// This is also the wire format a worker process writes to stdout, one JSON
/// object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub success: bool,
    #[serde(default)]
    pub document: Option<StructuredDocument>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConversionOutcome {
    pub fn ok(document: StructuredDocument) -> Self {
        Self {
            success: true,
            document: Some(document),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            document: None,
            error: Some(reason.into()),
        }
    }
}

/// The result of converting one chunk, keyed by its ordinal.
///
/// A JSON array of these, in ordinal order, is the persisted results format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub ordinal: usize,
    pub chunk_path: PathBuf,
    /// Source-relative, zero-based first page.
    pub start_page: usize,
    /// Source-relative, exclusive last page.
    pub end_page: usize,
    pub success: bool,
    #[serde(default)]
    pub document: Option<StructuredDocument>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConversionResult {
    /// Attach a service outcome to the artifact it came from.
    pub fn from_outcome(artifact: &ChunkArtifact, outcome: ConversionOutcome) -> Self {
        // A success without a document is kept as a success; merge skips it
        // and validation flags it.
        let error = if outcome.success {
            None
        } else {
            let detail = outcome
                .error
                .unwrap_or_else(|| "no reason given".to_string());
            Some(
                ChunkError::Conversion {
                    ordinal: artifact.ordinal,
                    detail,
                }
                .to_string(),
            )
        };
        Self {
            ordinal: artifact.ordinal,
            chunk_path: artifact.path.clone(),
            start_page: artifact.boundary.start,
            end_page: artifact.boundary.end,
            success: outcome.success,
            document: if outcome.success { outcome.document } else { None },
            error,
        }
    }

    /// A failed result carrying `err` as its reason.
    pub fn from_error(artifact: &ChunkArtifact, err: &ChunkError) -> Self {
        Self {
            ordinal: artifact.ordinal,
            chunk_path: artifact.path.clone(),
            start_page: artifact.boundary.start,
            end_page: artifact.boundary.end,
            success: false,
            document: None,
            error: Some(err.to_string()),
        }
    }

    pub fn boundary(&self) -> Boundary {
        Boundary::new(self.start_page, self.end_page)
    }

    pub fn chunk_name(&self) -> String {
        file_name_of(&self.chunk_path)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// What `analyze` reports about a source PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub file_size_bytes: u64,
    pub pdf_version: String,
    /// Flattened outline in document order, all levels.
    pub outline: Vec<OutlineEntry>,
}

impl DocumentInfo {
    pub fn has_outline(&self) -> bool {
        !self.outline.is_empty()
    }
}

/// Counts and timings for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pages: usize,
    pub total_chunks: usize,
    pub written_chunks: usize,
    pub succeeded_chunks: usize,
    pub failed_chunks: usize,
    pub split_duration_ms: u64,
    pub convert_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a [`crate::run::run_pipeline`] call produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub plan: SplitPlan,
    pub written: WriteReport,
    pub results: Vec<ConversionResult>,
    pub merged: Result<StructuredDocument, MergeError>,
    pub report: ValidationReport,
    pub stats: RunStats,
}

impl PipelineOutcome {
    /// True when the merge succeeded and the validation report passed.
    pub fn is_success(&self) -> bool {
        self.merged.is_ok() && self.report.passed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ChunkArtifact {
        ChunkArtifact {
            ordinal: 2,
            boundary: Boundary::new(90, 120),
            path: PathBuf::from("/tmp/chunk_0002_pages_0090_0120.pdf"),
        }
    }

    #[test]
    fn boundary_len_and_contains() {
        let b = Boundary::new(45, 95);
        assert_eq!(b.len(), 50);
        assert!(b.contains(45));
        assert!(!b.contains(95));
        assert!(Boundary::new(3, 3).is_empty());
    }

    #[test]
    fn failed_outcome_drops_document() {
        let mut outcome = ConversionOutcome::failed("boom");
        outcome.document = Some(StructuredDocument::new("x"));
        let r = ConversionResult::from_outcome(&artifact(), outcome);
        assert!(!r.success);
        assert!(r.document.is_none());
        assert_eq!(r.error.as_deref(), Some("Chunk 2: conversion failed: boom"));
        assert_eq!(r.boundary(), Boundary::new(90, 120));
    }

    #[test]
    fn failure_without_reason_gets_one() {
        let outcome = ConversionOutcome {
            success: false,
            document: None,
            error: None,
        };
        let r = ConversionResult::from_outcome(&artifact(), outcome);
        assert!(r.error.is_some());
    }

    #[test]
    fn persisted_record_field_names() {
        let r = ConversionResult::from_outcome(
            &artifact(),
            ConversionOutcome::ok(StructuredDocument::new("c")),
        );
        let v = serde_json::to_value(&r).unwrap();
        for key in ["ordinal", "chunk_path", "start_page", "end_page", "success", "document", "error"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(r.chunk_name(), "chunk_0002_pages_0090_0120.pdf");
    }
}
