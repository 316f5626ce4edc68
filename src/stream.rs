//! Streaming conversion: yield chunk results as workers finish them.
//!
//! [`crate::run::run_pipeline`] waits for every chunk, merges and validates.
//! [`run_stream`] stops after splitting and hands back a stream instead, so
//! callers can persist or display each chunk as soon as it is done. Results
//! arrive in completion order; sort by `ordinal` before merging.

use crate::config::PipelineConfig;
use crate::error::SplitterError;
use crate::output::ConversionResult;
use crate::pipeline::orchestrate::{self, WorkerBackend};
use crate::pipeline::plan::{self, SplitPlan};
use crate::pipeline::split::{self, WriteReport};
use crate::pipeline::{input, source};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of chunk results.
pub type ResultStream = Pin<Box<dyn Stream<Item = ConversionResult> + Send>>;

/// Plan and split `input`, then stream conversion results.
///
/// Only chunks that were written are converted; write failures are in the
/// returned [`WriteReport`].
///
/// # Example
/// ```rust,no_run
/// use pdf_splitter::{run_stream, CommandConverter, PipelineConfig, WorkerBackend};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = CommandConverter::from_command_line("docling-json")?;
/// let backend = WorkerBackend::InProcess(Arc::new(converter));
/// let (_plan, _written, mut results) =
///     run_stream("report.pdf", &backend, &PipelineConfig::default()).await?;
/// while let Some(result) = results.next().await {
///     println!("chunk {} → {}", result.ordinal, result.success);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_stream(
    input_str: &str,
    backend: &WorkerBackend,
    config: &PipelineConfig,
) -> Result<(SplitPlan, WriteReport, ResultStream), SplitterError> {
    info!("Starting streaming run: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let info = source::inspect_document(resolved.path(), config.password.as_deref()).await?;
    let plan = plan::plan_with(info.page_count, Some(&info.outline), &config.plan_options());

    let written = split::materialize(
        resolved.path(),
        &plan.boundaries,
        config.output_dir.as_deref(),
        config.password.as_deref(),
    )
    .await?;

    let mut orchestrator = config.orchestrator();
    if config.sequential {
        orchestrator.workers = 1;
    }
    let results = orchestrate::run_unordered(&written.artifacts, backend, &orchestrator);
    Ok((plan, written, Box::pin(results)))
}
