//! Input resolution: turn a user-supplied path or URL into a local PDF.
//!
//! pdfium only opens files, so URLs are streamed into a `TempDir` that lives
//! as long as the returned [`ResolvedInput`]. The `%PDF` magic is checked
//! before anything is handed to pdfium.

use crate::error::SplitterError;
use futures::StreamExt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A local PDF, possibly downloaded into a temp directory.
pub enum ResolvedInput {
    Local(PathBuf),
    /// The `TempDir` is removed when this value is dropped.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// File stem of the PDF, used to name merged documents.
    pub fn stem(&self) -> String {
        self.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF path, downloading URLs first.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, SplitterError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).map(ResolvedInput::Local)
    }
}

/// Check that `path` exists, is readable, and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, SplitterError> {
    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(SplitterError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SplitterError::PermissionDenied { path });
        }
        Err(_) => return Err(SplitterError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    let read = file.read(&mut magic).unwrap_or(0);
    if read < magic.len() || &magic != PDF_MAGIC {
        return Err(SplitterError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, SplitterError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| SplitterError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            SplitterError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(classify)?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let temp_dir = tempfile::Builder::new()
        .prefix("pdf_source_")
        .tempdir()
        .map_err(|e| SplitterError::Internal(format!("Cannot create temp dir: {e}")))?;
    let file_path = temp_dir.path().join(filename_from_url(url));

    let mut file = tokio::fs::File::create(&file_path)
        .await
        .map_err(|e| SplitterError::OutputWriteFailed {
            path: file_path.clone(),
            source: e,
        })?;

    let mut head: Vec<u8> = Vec::with_capacity(PDF_MAGIC.len());
    let mut written: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(piece) = body.next().await {
        let piece = piece.map_err(classify)?;
        if head.len() < PDF_MAGIC.len() {
            let take = (PDF_MAGIC.len() - head.len()).min(piece.len());
            head.extend_from_slice(&piece[..take]);
        }
        file.write_all(&piece)
            .await
            .map_err(|e| SplitterError::OutputWriteFailed {
                path: file_path.clone(),
                source: e,
            })?;
        written += piece.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| SplitterError::OutputWriteFailed {
            path: file_path.clone(),
            source: e,
        })?;

    if head.as_slice() != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic[..head.len()].copy_from_slice(&head);
        return Err(SplitterError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    info!("Downloaded {} bytes to {}", written, file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_comes_from_last_segment() {
        assert_eq!(filename_from_url("https://x.org/papers/a.pdf?dl=1"), "a.pdf");
        assert_eq!(filename_from_url("https://x.org/download"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://x.org/"), "downloaded.pdf");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local(Path::new("/nonexistent/report.pdf")).unwrap_err();
        assert!(matches!(err, SplitterError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected_by_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04 not a pdf").unwrap();
        match resolve_local(f.path()).unwrap_err() {
            SplitterError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_file_is_not_a_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_local(f.path()).unwrap_err(),
            SplitterError::NotAPdf { .. }
        ));
    }

    #[tokio::test]
    async fn local_pdf_resolves_to_itself() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), f.path());
        assert!(!resolved.stem().is_empty());
    }
}
