//! Source document access via pdfium: page count, metadata and outline.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks on file I/O. Every call here is moved onto tokio's
//! blocking pool so async worker threads never stall on it.
//!
//! ## Outline walking
//!
//! Bookmarks are walked depth-first from the root, recording each entry's
//! depth and destination page. Malformed outlines can loop back on
//! themselves, so the walk is capped in both depth and entry count.

use crate::error::{PlanningError, SplitterError};
use crate::output::DocumentInfo;
use crate::pipeline::plan::OutlineEntry;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

const MAX_OUTLINE_DEPTH: usize = 32;
const MAX_OUTLINE_ENTRIES: usize = 20_000;

/// Bind to a pdfium shared library.
///
/// Lookup order: `PDFIUM_LIB_PATH`, the working directory, the system
/// library search path.
pub fn bind_pdfium() -> Result<Pdfium, SplitterError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| SplitterError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Open `path`, mapping pdfium's load errors onto [`SplitterError`].
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, SplitterError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            SplitterError::PasswordRequired {
                path: path.to_path_buf(),
            }
        } else {
            SplitterError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })
}

/// Read page count, metadata and the full outline of a PDF.
pub async fn inspect_document(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, SplitterError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || inspect_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| SplitterError::Internal(format!("Inspect task panicked: {e}")))?
}

fn inspect_blocking(pdf_path: &Path, password: Option<&str>) -> Result<DocumentInfo, SplitterError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let page_count = document.pages().len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let outline = match read_outline(&document) {
        Ok(outline) => outline,
        Err(e) => {
            warn!("{e}; planning will use fixed-size chunks");
            Vec::new()
        }
    };
    debug!("Outline has {} entries", outline.len());

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let file_size_bytes = std::fs::metadata(pdf_path).map(|m| m.len()).unwrap_or(0);

    Ok(DocumentInfo {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count,
        file_size_bytes,
        pdf_version: format!("{:?}", document.version()),
        outline,
    })
}

/// Flatten the bookmark tree into depth-annotated entries, document order.
fn read_outline(document: &PdfDocument<'_>) -> Result<Vec<OutlineEntry>, PlanningError> {
    let mut entries = Vec::new();
    if let Some(root) = document.bookmarks().root() {
        collect_bookmarks(root, 0, &mut entries)?;
    }
    Ok(entries)
}

fn collect_bookmarks(
    first: PdfBookmark<'_>,
    level: usize,
    out: &mut Vec<OutlineEntry>,
) -> Result<(), PlanningError> {
    if level > MAX_OUTLINE_DEPTH {
        return Err(PlanningError(format!(
            "outline deeper than {MAX_OUTLINE_DEPTH} levels"
        )));
    }

    let mut current = Some(first);
    while let Some(bookmark) = current {
        if out.len() >= MAX_OUTLINE_ENTRIES {
            return Err(PlanningError(format!(
                "outline has more than {MAX_OUTLINE_ENTRIES} entries"
            )));
        }

        // Entries whose destination does not resolve are kept with no page;
        // the planner skips them.
        let page = bookmark
            .destination()
            .and_then(|d| d.page_index().ok())
            .map(|i| i as usize);

        out.push(OutlineEntry {
            title: bookmark.title().unwrap_or_default(),
            level,
            page,
        });

        if let Some(child) = bookmark.first_child() {
            collect_bookmarks(child, level + 1, out)?;
        }
        current = bookmark.next_sibling();
    }
    Ok(())
}
