//! # pdf-splitter
//!
//! Split large PDFs into page-range chunks, convert the chunks in parallel
//! isolated worker processes, and reassemble one structured document with
//! source-relative page numbers.
//!
//! ## Why split?
//!
//! Document-conversion backends load a whole PDF into memory and can crash
//! or leak on long inputs. Cutting the document along its chapter bookmarks
//! (or into fixed windows) bounds the memory each conversion needs, lets
//! chunks run on every core, and turns a crash into one failed chunk rather
//! than a lost run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Plan      bookmark / fixed / hybrid boundaries, short chunks merged
//!  ├─ 3. Split     one chunk PDF per boundary (pdfium, spawn_blocking)
//!  ├─ 4. Convert   bounded pool of disposable worker processes
//!  ├─ 5. Merge     fold chunk documents, offsetting provenance pages
//!  └─ 6. Validate  per-chunk and global page coverage
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_splitter::{run_pipeline, CommandConverter, PipelineConfig, WorkerBackend};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = CommandConverter::from_command_line("docling-json")?;
//!     let backend = WorkerBackend::InProcess(Arc::new(converter));
//!     let config = PipelineConfig::builder().max_chunk_pages(50).build()?;
//!
//!     let outcome = run_pipeline("book.pdf", &backend, &config).await?;
//!     eprintln!("{}/{} chunks converted",
//!         outcome.stats.succeeded_chunks, outcome.stats.total_chunks);
//!     for finding in &outcome.report.findings {
//!         eprintln!("  {finding}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-splitter` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-splitter = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use document::{DocItem, ItemLabel, ProvenanceItem, ProvenanceSource, StructuredDocument};
pub use error::{ChunkError, MergeError, PlanningError, SplitterError};
pub use output::{
    Boundary, ChunkArtifact, ConversionOutcome, ConversionResult, DocumentInfo, PipelineOutcome,
    RunStats,
};
pub use pipeline::merge::{merge, merge_statistics, DocumentStats};
pub use pipeline::orchestrate::{default_worker_count, WorkerBackend, WorkerCommand};
pub use pipeline::plan::{plan, plan_with, OutlineEntry, PlanOptions, SplitPlan, Strategy};
pub use pipeline::split::{chunk_file_name, materialize, parse_chunk_file_name, WriteReport};
pub use pipeline::validate::{validate, Finding, ValidationConfig, ValidationReport};
pub use pipeline::worker::{serve_worker, ChunkConverter, CommandConverter};
pub use progress::{ChunkProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{
    analyze, batch, compare, read_results, run_pipeline, run_pipeline_sync, split_to_files,
    write_results,
};
pub use stream::run_stream;
