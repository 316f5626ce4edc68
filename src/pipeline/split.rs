//! Chunk writing: materialise one PDF per boundary.
//!
//! Each chunk holds pages `[start, end)` of the source, renumbered from 1.
//! Its file name carries the ordinal and the *source-relative* range —
//! `chunk_0003_pages_0090_0120.pdf` — so any later process can map chunk
//! pages back to source pages from the name alone.
//!
//! A chunk that fails to write is reported in [`WriteReport::failures`];
//! the remaining chunks are still written. Only problems that affect every
//! chunk (source unreadable, output directory unusable) are fatal.

use crate::error::{ChunkError, SplitterError};
use crate::output::{Boundary, ChunkArtifact};
use crate::pipeline::source::{bind_pdfium, open_document};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of the temporary directory used when no output directory is given.
pub const CHUNK_DIR_PREFIX: &str = "pdf_chunks_";

static RE_CHUNK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^chunk_(\d+)_pages_(\d+)_(\d+)\.pdf$").unwrap());

/// File name for chunk `ordinal` covering `boundary`.
pub fn chunk_file_name(ordinal: usize, boundary: Boundary) -> String {
    format!(
        "chunk_{:04}_pages_{:04}_{:04}.pdf",
        ordinal, boundary.start, boundary.end
    )
}

/// Recover `(ordinal, boundary)` from a chunk file name (or path).
pub fn parse_chunk_file_name(name: &str) -> Option<(usize, Boundary)> {
    let file_name = Path::new(name).file_name()?.to_str()?;
    let caps = RE_CHUNK_NAME.captures(file_name)?;
    let ordinal = caps.get(1)?.as_str().parse().ok()?;
    let start = caps.get(2)?.as_str().parse().ok()?;
    let end = caps.get(3)?.as_str().parse().ok()?;
    let boundary = Boundary::new(start, end);
    (!boundary.is_empty()).then_some((ordinal, boundary))
}

/// What [`materialize`] wrote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteReport {
    pub output_dir: PathBuf,
    /// Written chunks, in boundary order.
    pub artifacts: Vec<ChunkArtifact>,
    pub failures: Vec<ChunkError>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write one chunk PDF per boundary into `output_dir`, or into a fresh
/// `pdf_chunks_*` temp directory that is left on disk for the caller.
pub async fn materialize(
    source: &Path,
    boundaries: &[Boundary],
    output_dir: Option<&Path>,
    password: Option<&str>,
) -> Result<WriteReport, SplitterError> {
    let dir = prepare_output_dir(output_dir)?;
    let source = source.to_path_buf();
    let boundaries = boundaries.to_vec();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || write_blocking(&source, &boundaries, dir, pwd.as_deref()))
        .await
        .map_err(|e| SplitterError::Internal(format!("Chunk writer panicked: {e}")))?
}

fn prepare_output_dir(output_dir: Option<&Path>) -> Result<PathBuf, SplitterError> {
    match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| SplitterError::OutputDirFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
            Ok(dir.to_path_buf())
        }
        None => tempfile::Builder::new()
            .prefix(CHUNK_DIR_PREFIX)
            .tempdir()
            .map(|d| d.keep())
            .map_err(|e| SplitterError::OutputDirFailed {
                path: std::env::temp_dir(),
                source: e,
            }),
    }
}

fn write_blocking(
    source: &Path,
    boundaries: &[Boundary],
    output_dir: PathBuf,
    password: Option<&str>,
) -> Result<WriteReport, SplitterError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, source, password)?;
    let total_pages = document.pages().len() as usize;

    let mut report = WriteReport {
        output_dir,
        artifacts: Vec::with_capacity(boundaries.len()),
        failures: Vec::new(),
    };

    for (ordinal, &boundary) in boundaries.iter().enumerate() {
        let path = report
            .output_dir
            .join(chunk_file_name(ordinal, boundary));

        match write_chunk(&pdfium, &document, boundary, total_pages, &path) {
            Ok(()) => {
                debug!("Wrote chunk {} {} → {}", ordinal, boundary, path.display());
                report.artifacts.push(ChunkArtifact {
                    ordinal,
                    boundary,
                    path,
                });
            }
            Err(detail) => {
                warn!("Chunk {} {} not written: {}", ordinal, boundary, detail);
                report.failures.push(ChunkError::ArtifactWrite {
                    ordinal,
                    path,
                    detail,
                });
            }
        }
    }

    info!(
        "Wrote {}/{} chunks to {}",
        report.artifacts.len(),
        boundaries.len(),
        report.output_dir.display()
    );
    Ok(report)
}

fn write_chunk(
    pdfium: &Pdfium,
    source: &PdfDocument<'_>,
    boundary: Boundary,
    total_pages: usize,
    path: &Path,
) -> Result<(), String> {
    if boundary.is_empty() || boundary.end > total_pages {
        return Err(format!(
            "range {boundary} is outside a document of {total_pages} pages"
        ));
    }

    let first = PdfPageIndex::try_from(boundary.start)
        .map_err(|_| format!("page {} exceeds pdfium's page index range", boundary.start))?;
    let last = PdfPageIndex::try_from(boundary.end - 1)
        .map_err(|_| format!("page {} exceeds pdfium's page index range", boundary.end - 1))?;

    let mut chunk = pdfium
        .create_new_pdf()
        .map_err(|e| format!("create document: {e:?}"))?;
    chunk
        .pages_mut()
        .copy_page_range_from_document(source, first..=last, 0)
        .map_err(|e| format!("copy pages: {e:?}"))?;
    chunk
        .save_to_file(path)
        .map_err(|e| format!("save: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_name_encodes_ordinal_and_source_range() {
        assert_eq!(
            chunk_file_name(3, Boundary::new(90, 120)),
            "chunk_0003_pages_0090_0120.pdf"
        );
        assert_eq!(
            chunk_file_name(12, Boundary::new(1200, 12345)),
            "chunk_0012_pages_1200_12345.pdf"
        );
    }

    #[test]
    fn chunk_name_parses_back() {
        let name = chunk_file_name(7, Boundary::new(45, 95));
        assert_eq!(
            parse_chunk_file_name(&name),
            Some((7, Boundary::new(45, 95)))
        );
        assert_eq!(
            parse_chunk_file_name("/tmp/out/chunk_0001_pages_0010_0020.pdf"),
            Some((1, Boundary::new(10, 20)))
        );
    }

    #[test]
    fn malformed_chunk_names_are_rejected() {
        assert_eq!(parse_chunk_file_name("chunk_1.pdf"), None);
        assert_eq!(parse_chunk_file_name("chunk_0001_pages_0010_0010.pdf"), None);
        assert_eq!(parse_chunk_file_name("chunk_0001_pages_0010_0020.PDF"), None);
        assert_eq!(parse_chunk_file_name(""), None);
    }

    #[test]
    fn explicit_output_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/chunks");
        let dir = prepare_output_dir(Some(&nested)).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn default_output_dir_is_prefixed_temp_dir() {
        let dir = prepare_output_dir(None).unwrap();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(CHUNK_DIR_PREFIX), "got {name}");
        assert!(dir.is_dir());
        std::fs::remove_dir_all(dir).ok();
    }
}
