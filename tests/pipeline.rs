//! Integration tests for the convert → merge → validate half of the pipeline.
//!
//! These run without pdfium: chunk artifacts point at paths that are never
//! opened, and the converters synthesise documents from the chunk file name.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use pdf_splitter::pipeline::orchestrate::{self, OrchestratorConfig};
use pdf_splitter::pipeline::validate::audit;
use pdf_splitter::{
    chunk_file_name, merge, merge_statistics, parse_chunk_file_name, plan, read_results, validate,
    write_results, Boundary, ChunkArtifact, ChunkConverter, ConversionOutcome, DocItem, Finding,
    ItemLabel, StructuredDocument, ValidationConfig, WorkerBackend,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Emits one text item per chunk page, numbered chunk-relative.
struct PageEcho {
    fail_ordinal: Option<usize>,
}

impl ChunkConverter for PageEcho {
    fn convert(&self, chunk_path: &Path) -> ConversionOutcome {
        let Some((ordinal, boundary)) = parse_chunk_file_name(&chunk_path.to_string_lossy())
        else {
            return ConversionOutcome::failed("unrecognised chunk name");
        };
        if self.fail_ordinal == Some(ordinal) {
            return ConversionOutcome::failed("backend out of memory");
        }
        let mut doc = StructuredDocument::new(format!("chunk {ordinal}"));
        doc.page_count = Some(boundary.len());
        for page in 1..=boundary.len() {
            doc.items.push(DocItem::on_page(
                ItemLabel::Text,
                format!("source page {}", boundary.start + page),
                page,
            ));
        }
        ConversionOutcome::ok(doc)
    }
}

/// Leaves each chunk's last page blank and does not declare a page count.
struct TrailingBlankPage;

impl ChunkConverter for TrailingBlankPage {
    fn convert(&self, chunk_path: &Path) -> ConversionOutcome {
        let Some((_, boundary)) = parse_chunk_file_name(&chunk_path.to_string_lossy()) else {
            return ConversionOutcome::failed("unrecognised chunk name");
        };
        let mut doc = StructuredDocument::new("chunk");
        doc.items = (1..boundary.len())
            .map(|p| DocItem::on_page(ItemLabel::Text, "body", p))
            .collect();
        ConversionOutcome::ok(doc)
    }
}

fn artifacts_for(dir: &Path, boundaries: &[Boundary]) -> Vec<ChunkArtifact> {
    boundaries
        .iter()
        .enumerate()
        .map(|(ordinal, &boundary)| ChunkArtifact {
            ordinal,
            boundary,
            path: dir.join(chunk_file_name(ordinal, boundary)),
        })
        .collect()
}

fn item_pages(doc: &StructuredDocument) -> Vec<usize> {
    doc.iter_items()
        .flat_map(|(item, _)| item.prov.iter().map(|p| p.page_no))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_planned_chunks_merge_back_to_source_pages() {
    let dir = tempfile::tempdir().unwrap();
    let boundaries = plan(230, None, 100, 15, 0);
    assert_eq!(boundaries.len(), 3);

    let artifacts = artifacts_for(dir.path(), &boundaries);
    let backend = WorkerBackend::InProcess(Arc::new(PageEcho { fail_ordinal: None }));
    let config = OrchestratorConfig {
        workers: 3,
        ..OrchestratorConfig::default()
    };
    let results = orchestrate::run(&artifacts, &backend, &config).await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));

    let merged = merge(&results).unwrap();
    assert_eq!(merged.page_count, Some(230));
    assert_eq!(item_pages(&merged), (1..=230).collect::<Vec<_>>());

    let stats = merge_statistics(&merged);
    assert_eq!(stats.text_items, 230);
    assert_eq!(stats.page_range, Some((1, 230)));

    let report = validate(&boundaries, &results, Some(&merged), &ValidationConfig::default());
    assert!(report.passed(), "unexpected findings: {:?}", report.findings);
    assert_eq!(report.valid_chunks(), 3);
    assert_eq!(report.monotonic, Some(true));
}

#[tokio::test]
async fn test_failed_chunk_is_reported_but_others_merge() {
    let dir = tempfile::tempdir().unwrap();
    let boundaries = plan(90, None, 30, 1, 0);
    let artifacts = artifacts_for(dir.path(), &boundaries);
    let backend = WorkerBackend::InProcess(Arc::new(PageEcho {
        fail_ordinal: Some(1),
    }));

    let results = orchestrate::run(&artifacts, &backend, &OrchestratorConfig::default()).await;
    assert_eq!(results.iter().filter(|r| r.success).count(), 2);
    assert!(results[1]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("out of memory"));

    // Two of three chunks: 60 pages, renumbered contiguously.
    let merged = merge(&results).unwrap();
    assert_eq!(merged.page_count, Some(60));

    let report = validate(&boundaries, &results, Some(&merged), &ValidationConfig::default());
    assert!(!report.passed());
    assert!(report
        .findings
        .iter()
        .any(|f| matches!(f, Finding::ConversionFailed { ordinal: 1, .. })));
    assert_eq!(report.valid_chunks(), 2);
}

#[tokio::test]
async fn test_blank_last_pages_keep_source_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let boundaries = plan(90, None, 30, 1, 0);
    let artifacts = artifacts_for(dir.path(), &boundaries);
    let backend = WorkerBackend::InProcess(Arc::new(TrailingBlankPage));

    let results = orchestrate::run(&artifacts, &backend, &OrchestratorConfig::default()).await;
    let merged = merge(&results).unwrap();

    // Source pages 30, 60 and 90 are blank; everything else keeps its number.
    let expected: Vec<usize> = (1..=90).filter(|p| p % 30 != 0).collect();
    assert_eq!(item_pages(&merged), expected);
    assert_eq!(merged.page_count, Some(90));

    let report = validate(&boundaries, &results, Some(&merged), &ValidationConfig::default());
    assert!(report.passed(), "unexpected findings: {:?}", report.findings);
}

#[tokio::test]
async fn test_persisted_results_audit_like_the_live_run() {
    let dir = tempfile::tempdir().unwrap();
    let boundaries = plan(120, None, 50, 10, 0);
    let artifacts = artifacts_for(dir.path(), &boundaries);
    let backend = WorkerBackend::InProcess(Arc::new(PageEcho { fail_ordinal: None }));
    let results = orchestrate::run(&artifacts, &backend, &OrchestratorConfig::default()).await;

    let path = dir.path().join("results.json");
    write_results(&path, &results).await.unwrap();
    let loaded = read_results(&path).unwrap();
    assert_eq!(loaded, results);

    let live = validate(&boundaries, &results, None, &ValidationConfig::default());
    let replayed = audit(&loaded, None, &ValidationConfig::default());
    assert_eq!(live.findings, replayed.findings);
    assert_eq!(live.valid_chunks(), replayed.valid_chunks());
    assert!(replayed.passed());
}

#[test]
fn test_read_results_missing_file() {
    let err = read_results(Path::new("/nonexistent/results.json")).unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_worker_subcommand_serves_process_backend() {
    use pdf_splitter::WorkerCommand;
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("one_page_converter.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\nprintf '%s\\n' '{\"page_count\":1,\"items\":[{\"label\":\"text\",\"text\":\"hi\",\"prov\":[{\"page_no\":1}]}]}'\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let boundaries: Vec<Boundary> = (0..4).map(|p| Boundary::new(p, p + 1)).collect();
    let artifacts = artifacts_for(dir.path(), &boundaries);
    let backend = WorkerBackend::Process(
        WorkerCommand::new(PathBuf::from(env!("CARGO_BIN_EXE_pdf-splitter")))
            .arg("worker")
            .arg("--converter")
            .arg(script.to_string_lossy())
            .arg("--quiet"),
    );
    let config = OrchestratorConfig {
        workers: 2,
        tasks_per_worker: 2,
        ..OrchestratorConfig::default()
    };

    let results = orchestrate::run(&artifacts, &backend, &config).await;
    assert_eq!(results.len(), 4);
    for r in &results {
        assert!(r.success, "chunk {} failed: {:?}", r.ordinal, r.error);
    }

    let merged = merge(&results).unwrap();
    assert_eq!(item_pages(&merged), vec![1, 2, 3, 4]);
}
