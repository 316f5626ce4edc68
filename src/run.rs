//! Library entry points: analyze, split, convert, and persist results.
//!
//! [`run_pipeline`] is the full flow:
//!
//! ```text
//! input ──▶ inspect ──▶ plan ──▶ materialize ──▶ orchestrate ──▶ merge ──▶ validate
//! ```
//!
//! Every stage before orchestration is fatal on error. From orchestration on,
//! failures are data: failed chunks become failed results, a merge failure
//! is carried in [`PipelineOutcome::merged`], and validation only reports.

use crate::config::PipelineConfig;
use crate::document::StructuredDocument;
use crate::error::{ChunkError, SplitterError};
use crate::output::{ConversionResult, DocumentInfo, PipelineOutcome, RunStats};
use crate::pipeline::orchestrate::{self, WorkerBackend};
use crate::pipeline::plan::{self, OutlineLevel, SplitPlan, Strategy};
use crate::pipeline::split::{self, WriteReport};
use crate::pipeline::{input, merge, source, validate};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What `analyze` reports for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub info: DocumentInfo,
    pub outline_levels: Vec<OutlineLevel>,
    pub plan: SplitPlan,
}

/// Inspect a document and plan it with the configured strategy. Writes
/// nothing.
pub async fn analyze(input_str: &str, config: &PipelineConfig) -> Result<Analysis, SplitterError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let info = source::inspect_document(resolved.path(), config.password.as_deref()).await?;
    let plan = plan::plan_with(info.page_count, Some(&info.outline), &config.plan_options());
    Ok(Analysis {
        outline_levels: plan::outline_levels(&info.outline),
        info,
        plan,
    })
}

/// Strategies shown side by side by [`compare`], smart last.
pub const COMPARED_STRATEGIES: [Strategy; 5] = [
    Strategy::Fixed,
    Strategy::Bookmark,
    Strategy::Hybrid,
    Strategy::Enhanced,
    Strategy::Smart,
];

/// Plan the same document with every strategy in [`COMPARED_STRATEGIES`].
pub fn compare_plans(
    info: &DocumentInfo,
    config: &PipelineConfig,
) -> Vec<(Strategy, SplitPlan)> {
    COMPARED_STRATEGIES
        .iter()
        .map(|&strategy| {
            let mut options = config.plan_options();
            options.strategy = strategy;
            (
                strategy,
                plan::plan_with(info.page_count, Some(&info.outline), &options),
            )
        })
        .collect()
}

/// Inspect a document and plan it with every strategy.
pub async fn compare(
    input_str: &str,
    config: &PipelineConfig,
) -> Result<(DocumentInfo, Vec<(Strategy, SplitPlan)>), SplitterError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let info = source::inspect_document(resolved.path(), config.password.as_deref()).await?;
    let plans = compare_plans(&info, config);
    Ok((info, plans))
}

/// One row of a [`batch`] run.
#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub outcome: Result<SplitPlan, SplitterError>,
}

/// Plan every `*.pdf` directly inside `dir`, several at a time.
///
/// Per-file errors are reported in the entry; only an unreadable directory
/// is fatal. Entries are sorted by path.
pub async fn batch(dir: &Path, config: &PipelineConfig) -> Result<Vec<BatchEntry>, SplitterError> {
    if !dir.is_dir() {
        return Err(SplitterError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    let pdfs = list_pdfs(dir)?;
    info!("Batch: {} PDFs in {}", pdfs.len(), dir.display());

    let options = config.plan_options();
    let password = config.password.clone();
    let mut entries: Vec<BatchEntry> = stream::iter(pdfs.into_iter().map(|path| {
        let password = password.clone();
        async move {
            let outcome: Result<SplitPlan, SplitterError> = async {
                let checked = input::resolve_local(&path)?;
                let info = source::inspect_document(&checked, password.as_deref()).await?;
                Ok(plan::plan_with(info.page_count, Some(&info.outline), &options))
            }
            .await;
            if let Err(ref e) = outcome {
                warn!("{}: {}", path.display(), e);
            }
            BatchEntry { path, outcome }
        }
    }))
    .buffer_unordered(config.effective_workers())
    .collect()
    .await;

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, SplitterError> {
    let read = std::fs::read_dir(dir).map_err(|e| SplitterError::ResultsUnreadable {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut pdfs: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

/// Plan a document and write its chunk PDFs.
pub async fn split_to_files(
    input_str: &str,
    config: &PipelineConfig,
) -> Result<(SplitPlan, WriteReport), SplitterError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let info = source::inspect_document(resolved.path(), config.password.as_deref()).await?;
    let plan = plan::plan_with(info.page_count, Some(&info.outline), &config.plan_options());
    info!("{} chunks planned ({})", plan.num_chunks(), plan.strategy);

    let written = split::materialize(
        resolved.path(),
        &plan.boundaries,
        config.output_dir.as_deref(),
        config.password.as_deref(),
    )
    .await?;
    Ok((plan, written))
}

/// Split, convert every chunk with `backend`, merge, and validate.
///
/// With `config.sequential`, an in-process backend converts chunks one at a
/// time on a blocking thread; a process backend runs a single worker.
pub async fn run_pipeline(
    input_str: &str,
    backend: &WorkerBackend,
    config: &PipelineConfig,
) -> Result<PipelineOutcome, SplitterError> {
    let total_start = Instant::now();
    info!("Starting pipeline: {}", input_str);

    // ── Step 1: Resolve, inspect, plan, write ────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let info = source::inspect_document(resolved.path(), config.password.as_deref()).await?;
    let plan = plan::plan_with(info.page_count, Some(&info.outline), &config.plan_options());
    info!(
        "{} pages → {} chunks ({})",
        plan.total_pages,
        plan.num_chunks(),
        plan.strategy
    );

    let split_start = Instant::now();
    let written = split::materialize(
        resolved.path(),
        &plan.boundaries,
        config.output_dir.as_deref(),
        config.password.as_deref(),
    )
    .await?;
    let split_duration_ms = split_start.elapsed().as_millis() as u64;

    // ── Step 2: Convert ──────────────────────────────────────────────────
    let convert_start = Instant::now();
    let mut results = convert_artifacts(&written, backend, config).await?;
    let convert_duration_ms = convert_start.elapsed().as_millis() as u64;

    // Chunks that never made it to disk still get a (failed) result.
    for failure in &written.failures {
        if let ChunkError::ArtifactWrite { ordinal, path, .. } = failure {
            let Some(boundary) = plan.boundaries.get(*ordinal) else {
                continue;
            };
            results.push(ConversionResult {
                ordinal: *ordinal,
                chunk_path: path.clone(),
                start_page: boundary.start,
                end_page: boundary.end,
                success: false,
                document: None,
                error: Some(failure.to_string()),
            });
        }
    }
    results.sort_by_key(|r| r.ordinal);

    // ── Step 3: Merge and validate ───────────────────────────────────────
    let merged = merge::merge(&results).map(|mut doc| {
        doc.name = resolved.stem();
        doc
    });
    let report = validate::validate(
        &plan.boundaries,
        &results,
        merged.as_ref().ok(),
        &config.validation,
    );

    let succeeded = results.iter().filter(|r| r.success).count();
    let stats = RunStats {
        total_pages: plan.total_pages,
        total_chunks: plan.num_chunks(),
        written_chunks: written.artifacts.len(),
        succeeded_chunks: succeeded,
        failed_chunks: results.len() - succeeded,
        split_duration_ms,
        convert_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Pipeline complete: {}/{} chunks, {}ms total",
        succeeded, stats.total_chunks, stats.total_duration_ms
    );

    Ok(PipelineOutcome {
        plan,
        written,
        results,
        merged,
        report,
        stats,
    })
}

async fn convert_artifacts(
    written: &WriteReport,
    backend: &WorkerBackend,
    config: &PipelineConfig,
) -> Result<Vec<ConversionResult>, SplitterError> {
    match (config.sequential, backend) {
        (true, WorkerBackend::InProcess(converter)) => {
            let converter = Arc::clone(converter);
            let artifacts = written.artifacts.clone();
            let progress = config.progress_callback.clone();
            tokio::task::spawn_blocking(move || {
                orchestrate::run_sequential(&artifacts, converter.as_ref(), progress.as_ref())
            })
            .await
            .map_err(|e| SplitterError::Internal(format!("Sequential conversion panicked: {e}")))
        }
        (true, WorkerBackend::Process(_)) => {
            let mut single = config.orchestrator();
            single.workers = 1;
            Ok(orchestrate::run(&written.artifacts, backend, &single).await)
        }
        (false, _) => Ok(orchestrate::run(&written.artifacts, backend, &config.orchestrator()).await),
    }
}

/// Synchronous wrapper around [`run_pipeline`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_pipeline_sync(
    input_str: &str,
    backend: &WorkerBackend,
    config: &PipelineConfig,
) -> Result<PipelineOutcome, SplitterError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SplitterError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(run_pipeline(input_str, backend, config))
}

// ── Persistence ──────────────────────────────────────────────────────────

/// Write `value` as pretty JSON, atomically (temp file + rename).
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SplitterError> {
    let write_err = |e: std::io::Error| SplitterError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let json = serde_json::to_vec_pretty(value).map_err(|e| write_err(e.into()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

/// Persist results as a JSON array in ordinal order.
pub async fn write_results(path: &Path, results: &[ConversionResult]) -> Result<(), SplitterError> {
    let mut ordered: Vec<&ConversionResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.ordinal);
    write_json(path, &ordered).await
}

pub async fn write_document(path: &Path, doc: &StructuredDocument) -> Result<(), SplitterError> {
    write_json(path, doc).await
}

/// Load a results file written by [`write_results`].
pub fn read_results(path: &Path) -> Result<Vec<ConversionResult>, SplitterError> {
    let unreadable = |detail: String| SplitterError::ResultsUnreadable {
        path: path.to_path_buf(),
        detail,
    };
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SplitterError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => unreadable(e.to_string()),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| unreadable(e.to_string()))
}
