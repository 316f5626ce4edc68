//! Configuration for a split → convert → merge → validate run.
//!
//! Every knob lives in [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. Setters clamp obviously out-of-range values;
//! [`PipelineConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::SplitterError;
use crate::pipeline::orchestrate::{machine_worker_count, OrchestratorConfig};
use crate::pipeline::plan::{
    PlanOptions, Strategy, DEFAULT_MAX_CHUNK_PAGES, DEFAULT_MIN_CHUNK_PAGES, DEFAULT_OVERLAP_PAGES,
};
use crate::pipeline::validate::ValidationConfig;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a pipeline run.
///
/// # Example
/// ```rust
/// use pdf_splitter::{PipelineConfig, Strategy};
///
/// let config = PipelineConfig::builder()
///     .max_chunk_pages(50)
///     .min_chunk_pages(10)
///     .strategy(Strategy::Hybrid)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.plan_options().max_chunk_pages, 50);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Largest chunk, in pages. Default: 100.
    pub max_chunk_pages: usize,

    /// Chunks shorter than this are merged forward. Default: 15.
    pub min_chunk_pages: usize,

    /// Pages repeated between consecutive fixed-size chunks. Must be smaller
    /// than `max_chunk_pages`. Default: 0.
    pub overlap_pages: usize,

    /// Boundary planning strategy. Default: [`Strategy::Smart`].
    pub strategy: Strategy,

    /// Where chunk PDFs are written. `None` → a kept `pdf_chunks_*` temp dir.
    pub output_dir: Option<PathBuf>,

    /// Concurrent workers. `None` → 80 % of available cores, at least 1.
    pub workers: Option<usize>,

    /// Chunks a worker process converts before it is replaced. Default: 1.
    pub tasks_per_worker: usize,

    /// Per-chunk conversion deadline. Default: none.
    pub task_timeout: Option<Duration>,

    /// Convert chunks one at a time, in process. Default: false.
    pub sequential: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Coverage thresholds.
    pub validation: ValidationConfig,

    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_pages: DEFAULT_MAX_CHUNK_PAGES,
            min_chunk_pages: DEFAULT_MIN_CHUNK_PAGES,
            overlap_pages: DEFAULT_OVERLAP_PAGES,
            strategy: Strategy::default(),
            output_dir: None,
            workers: None,
            tasks_per_worker: 1,
            task_timeout: None,
            sequential: false,
            password: None,
            download_timeout_secs: 120,
            validation: ValidationConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_chunk_pages", &self.max_chunk_pages)
            .field("min_chunk_pages", &self.min_chunk_pages)
            .field("overlap_pages", &self.overlap_pages)
            .field("strategy", &self.strategy)
            .field("output_dir", &self.output_dir)
            .field("workers", &self.workers)
            .field("tasks_per_worker", &self.tasks_per_worker)
            .field("task_timeout", &self.task_timeout)
            .field("sequential", &self.sequential)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("validation", &self.validation)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ChunkProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            max_chunk_pages: self.max_chunk_pages,
            min_chunk_pages: self.min_chunk_pages,
            overlap_pages: self.overlap_pages,
            strategy: self.strategy,
        }
    }

    /// Worker count after resolving the default.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(machine_worker_count)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            workers: self.effective_workers(),
            tasks_per_worker: self.tasks_per_worker,
            task_timeout: self.task_timeout,
            progress_callback: self.progress_callback.clone(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_chunk_pages(mut self, n: usize) -> Self {
        self.config.max_chunk_pages = n.max(1);
        self
    }

    pub fn min_chunk_pages(mut self, n: usize) -> Self {
        self.config.min_chunk_pages = n.max(1);
        self
    }

    pub fn overlap_pages(mut self, n: usize) -> Self {
        self.config.overlap_pages = n;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = Some(n.max(1));
        self
    }

    pub fn tasks_per_worker(mut self, n: usize) -> Self {
        self.config.tasks_per_worker = n.max(1);
        self
    }

    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.config.task_timeout = Some(timeout);
        self
    }

    pub fn sequential(mut self, v: bool) -> Self {
        self.config.sequential = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn min_chunk_coverage(mut self, v: f64) -> Self {
        self.config.validation.min_chunk_coverage = v.clamp(0.0, 1.0);
        self
    }

    pub fn min_mean_coverage(mut self, v: f64) -> Self {
        self.config.validation.min_mean_coverage = v.clamp(0.0, 1.0);
        self
    }

    pub fn max_missing_fraction(mut self, v: f64) -> Self {
        self.config.validation.max_missing_fraction = v.clamp(0.0, 1.0);
        self
    }

    pub fn check_artifacts(mut self, v: bool) -> Self {
        self.config.validation.check_artifacts = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, SplitterError> {
        self.config.plan_options().validate()?;
        if self.config.task_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SplitterError::InvalidConfig(
                "Task timeout must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}
