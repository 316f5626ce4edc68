//! CLI binary for pdf-splitter.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`,
//! prints plans and reports, and sets the exit code.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_splitter::pipeline::validate::audit;
use pdf_splitter::run::write_document;
use pdf_splitter::{
    analyze, batch, compare, merge_statistics, read_results, run_pipeline, serve_worker,
    split_to_files, write_results, ChunkProgressCallback, CommandConverter, PipelineConfig,
    PipelineConfigBuilder, ProgressCallback, SplitPlan, StructuredDocument, Strategy,
    ValidationReport, WorkerBackend, WorkerCommand,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished chunk. Chunks finish
/// out of order, so start times are keyed by ordinal.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Splitting PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, ordinal: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&ordinal))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ChunkProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_chunks: usize) {
        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} chunks  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, ordinal: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(ordinal, Instant::now());
        }
        self.bar.set_message(format!("chunk {ordinal}"));
    }

    fn on_chunk_complete(&self, ordinal: usize, total: usize) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            green("✓"),
            ordinal,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, ordinal: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            ordinal,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(succeeded);
        if failed == 0 {
            eprintln!("{} {} chunks converted", green("✔"), bold(&succeeded.to_string()));
        } else {
            eprintln!(
                "{} {}/{} chunks converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show structure and the recommended split
  pdf-splitter analyze book.pdf -v

  # Write chunk PDFs
  pdf-splitter split book.pdf -o chunks/ --max-pages 50 -s hybrid

  # Compare strategies, or plan a whole directory
  pdf-splitter compare book.pdf
  pdf-splitter batch ./library

  # Split, convert in 6 worker processes, merge, validate
  pdf-splitter convert book.pdf --converter "docling-json" --workers 6 \
      --results results.json --merged book.json

  # Re-check a results file later
  pdf-splitter validate results.json

CONVERTER CONTRACT:
  The converter command is run with the chunk path appended and must print
  one structured document as JSON on stdout:
    {"schema_name": "DoclingDocument", "page_count": 45,
     "items": [{"label": "text", "text": "…", "prov": [{"page_no": 1}]}]}
  Page numbers are 1-based and relative to the chunk.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (else ./ then the system library)
  PDF_SPLITTER_*          Fallback for most flags, e.g. PDF_SPLITTER_MAX_PAGES
  RUST_LOG                Overrides the log filter
"#;

/// Split large PDFs into chunks and convert them in parallel.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-splitter",
    version,
    about = "Split large PDFs into chunks and convert them in parallel",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs and per-chunk detail.
    #[arg(short, long, global = true, env = "PDF_SPLITTER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_SPLITTER_QUIET")]
    quiet: bool,
}

/// Planning flags shared by every command that reads a PDF.
#[derive(Args, Debug, Clone)]
struct PlanArgs {
    /// Largest chunk, in pages.
    #[arg(long, env = "PDF_SPLITTER_MAX_PAGES", default_value_t = 100,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: u64,

    /// Chunks shorter than this are merged into the next one.
    #[arg(long, env = "PDF_SPLITTER_MIN_PAGES", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    min_pages: u64,

    /// Pages shared by consecutive fixed-size chunks.
    #[arg(long, env = "PDF_SPLITTER_OVERLAP", default_value_t = 0)]
    overlap: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF_SPLITTER_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds, for URL inputs.
    #[arg(long, env = "PDF_SPLITTER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show document structure and the recommended split.
    Analyze {
        /// Local PDF path or HTTP/HTTPS URL.
        input: String,
        #[command(flatten)]
        plan: PlanArgs,
        /// Print the analysis as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Plan a document and write its chunk PDFs.
    Split {
        input: String,
        /// Output directory (default: a new pdf_chunks_* temp directory).
        #[arg(short, long, env = "PDF_SPLITTER_OUTPUT")]
        output: Option<PathBuf>,
        /// Force a planning strategy.
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Plan a document with every strategy and compare chunk sizes.
    Compare {
        input: String,
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Plan every PDF in a directory.
    Batch {
        input_dir: PathBuf,
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Split, convert each chunk in a worker process, merge, and validate.
    Convert {
        input: String,
        /// Converter command; the chunk path is appended as the last argument.
        #[arg(long, env = "PDF_SPLITTER_CONVERTER")]
        converter: String,
        /// Directory for chunk PDFs.
        #[arg(short, long, env = "PDF_SPLITTER_OUTPUT")]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Concurrent worker processes (default: 80% of cores).
        #[arg(short, long, env = "PDF_SPLITTER_WORKERS")]
        workers: Option<usize>,
        /// Chunks a worker converts before it is replaced.
        #[arg(long, env = "PDF_SPLITTER_TASKS_PER_WORKER", default_value_t = 1)]
        tasks_per_worker: usize,
        /// Convert one chunk at a time in this process.
        #[arg(long, env = "PDF_SPLITTER_SEQUENTIAL")]
        sequential: bool,
        /// Per-chunk deadline in seconds; a hung worker is killed.
        #[arg(long, env = "PDF_SPLITTER_TASK_TIMEOUT")]
        task_timeout: Option<u64>,
        /// Write per-chunk results (JSON array) here.
        #[arg(long)]
        results: Option<PathBuf>,
        /// Write the merged document (JSON) here.
        #[arg(long)]
        merged: Option<PathBuf>,
        /// Disable the progress bar.
        #[arg(long, env = "PDF_SPLITTER_NO_PROGRESS")]
        no_progress: bool,
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Check a results file written by `convert --results`.
    Validate {
        results: PathBuf,
        /// Merged document to check for page-order regressions.
        #[arg(long)]
        merged: Option<PathBuf>,
        /// Also flag chunk files that no longer exist.
        #[arg(long)]
        check_files: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Serve conversion requests over stdin/stdout (used by `convert`).
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        converter: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Fixed,
    Bookmark,
    Hybrid,
    Enhanced,
    Smart,
}

impl From<StrategyArg> for Strategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Fixed => Strategy::Fixed,
            StrategyArg::Bookmark => Strategy::Bookmark,
            StrategyArg::Hybrid => Strategy::Hybrid,
            StrategyArg::Enhanced => Strategy::Enhanced,
            StrategyArg::Smart => Strategy::Smart,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback during `convert`, so library
    // INFO logs are suppressed while it is shown.
    let show_progress = matches!(
        cli.command,
        Command::Convert { no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Analyze { input, plan, json } => {
            let config = plan_config(&plan, None)?.build()?;
            let analysis = analyze(&input, &config)
                .await
                .with_context(|| format!("Failed to analyze {input}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
                return Ok(ExitCode::SUCCESS);
            }

            let info = &analysis.info;
            println!("{}", "=".repeat(70));
            println!("ANALYZING: {input}");
            println!("{}", "=".repeat(70));
            println!("File size: {:.2} MB", info.file_size_bytes as f64 / (1024.0 * 1024.0));
            println!("Total pages: {}", info.page_count);
            println!("Has bookmarks: {}", info.has_outline());
            if let Some(ref t) = info.title {
                println!("Title: {t}");
            }
            if !analysis.outline_levels.is_empty() {
                println!("\nBookmark Structure:");
                for level in &analysis.outline_levels {
                    println!(
                        "  Level {}: {} items ({} unique pages)",
                        level.level, level.count, level.unique_pages
                    );
                    if cli.verbose {
                        for title in &level.sample_titles {
                            println!("    - {}", truncate(title, 55));
                        }
                    }
                }
            }

            println!("\n{}", "=".repeat(70));
            println!("SPLIT PLAN");
            println!("{}", "=".repeat(70));
            println!("{}", analysis.plan.summary());
            if cli.verbose {
                print_chunks(&analysis.plan);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Split {
            input,
            output,
            strategy,
            plan,
        } => {
            let mut builder = plan_config(&plan, strategy)?;
            if let Some(ref dir) = output {
                builder = builder.output_dir(dir);
            }
            let config = builder.build()?;

            if !cli.quiet {
                println!("Splitting: {input}");
                println!("Max chunk size: {} pages", config.max_chunk_pages);
            }
            let (split_plan, written) = split_to_files(&input, &config)
                .await
                .with_context(|| format!("Failed to split {input}"))?;

            if !cli.quiet {
                println!("\n{}", split_plan.summary());
                println!("\nCreated {} chunk files:", written.artifacts.len());
            }
            let mut total_bytes = 0u64;
            for artifact in &written.artifacts {
                let size = std::fs::metadata(&artifact.path).map(|m| m.len()).unwrap_or(0);
                total_bytes += size;
                if cli.verbose {
                    println!("  {} ({:.1} KB)", artifact.file_name(), size as f64 / 1024.0);
                }
            }
            for failure in &written.failures {
                eprintln!("  {} {}", red("✗"), failure);
            }
            if !cli.quiet {
                println!("\nOutput directory: {}", written.output_dir.display());
                println!("Total size: {:.2} MB", total_bytes as f64 / (1024.0 * 1024.0));
            }
            Ok(if written.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Compare { input, plan } => {
            let config = plan_config(&plan, None)?.build()?;
            let (info, plans) = compare(&input, &config)
                .await
                .with_context(|| format!("Failed to compare strategies for {input}"))?;

            println!("{}", "=".repeat(75));
            println!("STRATEGY COMPARISON: {input} ({} pages)", info.page_count);
            println!("{}", "=".repeat(75));
            println!(
                "\n{:<35} {:>7} {:>6} {:>6} {:>8}",
                "Strategy", "Chunks", "Min", "Max", "Avg"
            );
            println!("{} {} {} {} {}", "-".repeat(35), "-".repeat(7), "-".repeat(6), "-".repeat(6), "-".repeat(8));
            for (strategy, p) in &plans {
                let label = format!("{strategy:?} ({})", p.strategy);
                println!(
                    "{:<35} {:>7} {:>6} {:>6} {:>8.1}",
                    truncate(&label, 34),
                    p.num_chunks(),
                    p.min_chunk_size(),
                    p.max_chunk_size(),
                    p.avg_chunk_size()
                );
            }
            if let Some((_, smart)) = plans.iter().find(|(s, _)| *s == Strategy::Smart) {
                println!("\nRecommendation: smart planning selected '{}'", smart.strategy);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Batch { input_dir, plan } => {
            let config = plan_config(&plan, None)?.build()?;
            let entries = batch(&input_dir, &config)
                .await
                .with_context(|| format!("Failed to read {}", input_dir.display()))?;
            if entries.is_empty() {
                println!("No PDFs found in {}", input_dir.display());
                return Ok(ExitCode::SUCCESS);
            }

            println!("{}", "=".repeat(75));
            println!("BATCH ANALYSIS: {} PDFs", entries.len());
            println!("{}", "=".repeat(75));
            println!(
                "\n{:<30} {:>7} {:>7} {:>6} {:<20}",
                "PDF", "Pages", "Chunks", "Max", "Strategy"
            );
            for entry in &entries {
                let name = entry
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match &entry.outcome {
                    Ok(p) => println!(
                        "{:<30} {:>7} {:>7} {:>6} {:<20}",
                        truncate(&name, 29),
                        p.total_pages,
                        p.num_chunks(),
                        p.max_chunk_size(),
                        truncate(&p.strategy.to_string(), 19)
                    ),
                    Err(e) => println!(
                        "{:<30} ERROR: {}",
                        truncate(&name, 29),
                        truncate(&e.to_string(), 40)
                    ),
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Convert {
            input,
            converter,
            output,
            strategy,
            workers,
            tasks_per_worker,
            sequential,
            task_timeout,
            results,
            merged,
            no_progress: _,
            plan,
        } => {
            let command_converter = CommandConverter::from_command_line(&converter)
                .context("Invalid --converter")?;

            let mut builder = plan_config(&plan, strategy)?
                .tasks_per_worker(tasks_per_worker)
                .sequential(sequential);
            if let Some(ref dir) = output {
                builder = builder.output_dir(dir);
            }
            if let Some(n) = workers {
                builder = builder.workers(n);
            }
            if let Some(secs) = task_timeout {
                builder = builder.task_timeout(Duration::from_secs(secs));
            }
            if show_progress {
                let cb = CliProgressCallback::new();
                builder = builder.progress_callback(cb as ProgressCallback);
            }
            let config = builder.build().context("Invalid configuration")?;

            let backend = if sequential {
                WorkerBackend::InProcess(Arc::new(command_converter))
            } else {
                let exe = std::env::current_exe().context("Cannot locate own executable")?;
                let mut cmd = WorkerCommand::new(exe)
                    .arg("worker")
                    .arg("--converter")
                    .arg(converter.clone());
                if !cli.verbose {
                    cmd = cmd.arg("--quiet");
                }
                WorkerBackend::Process(cmd)
            };

            let outcome = run_pipeline(&input, &backend, &config)
                .await
                .with_context(|| format!("Failed to convert {input}"))?;

            if let Some(ref path) = results {
                write_results(path, &outcome.results)
                    .await
                    .context("Failed to write results")?;
            }
            match (&outcome.merged, &merged) {
                (Ok(doc), Some(path)) => {
                    write_document(path, doc)
                        .await
                        .context("Failed to write merged document")?;
                }
                (Err(e), _) => eprintln!("{} {}", red("✘"), e),
                _ => {}
            }

            if !cli.quiet {
                let s = &outcome.stats;
                eprintln!(
                    "{}  {}/{} chunks  {} pages  split {}ms  convert {}ms  total {}ms",
                    if s.failed_chunks == 0 { green("✔") } else { cyan("⚠") },
                    s.succeeded_chunks,
                    s.total_chunks,
                    s.total_pages,
                    s.split_duration_ms,
                    s.convert_duration_ms,
                    s.total_duration_ms,
                );
                if let Ok(ref doc) = outcome.merged {
                    print_document_stats(doc);
                }
                print_report(&outcome.report, cli.verbose);
            }

            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Validate {
            results,
            merged,
            check_files,
            json,
        } => {
            let loaded = read_results(&results)
                .with_context(|| format!("Failed to load {}", results.display()))?;
            let merged_doc: Option<StructuredDocument> = match merged {
                Some(ref path) => {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Some(
                        serde_json::from_slice(&bytes)
                            .with_context(|| format!("{} is not a document", path.display()))?,
                    )
                }
                None => None,
            };

            let config = PipelineConfig::builder()
                .check_artifacts(check_files)
                .build()?;
            let report = audit(&loaded, merged_doc.as_ref(), &config.validation);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Validating: {} ({} chunk results)", results.display(), loaded.len());
                println!("{}", "=".repeat(70));
                print_report(&report, true);
            }
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Worker { converter } => {
            let converter = CommandConverter::from_command_line(&converter)
                .context("Invalid --converter")?;
            let handled = tokio::task::spawn_blocking(move || {
                let stdin = io::stdin();
                let stdout = io::stdout();
                serve_worker(&converter, stdin.lock(), stdout.lock())
            })
            .await
            .context("Worker loop panicked")?
            .context("Worker I/O failed")?;
            tracing::debug!("Worker handled {handled} requests");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Map shared planning flags onto a config builder.
fn plan_config(args: &PlanArgs, strategy: Option<StrategyArg>) -> Result<PipelineConfigBuilder> {
    let max = usize::try_from(args.max_pages).context("--max-pages is too large")?;
    let min = usize::try_from(args.min_pages).context("--min-pages is too large")?;
    let mut builder = PipelineConfig::builder()
        .max_chunk_pages(max)
        .min_chunk_pages(min)
        .overlap_pages(args.overlap)
        .download_timeout_secs(args.download_timeout);
    if let Some(s) = strategy {
        builder = builder.strategy(s.into());
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    Ok(builder)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).chain(['…']).collect()
    }
}

fn print_chunks(plan: &SplitPlan) {
    println!("\nChunk Details:");
    for (i, b) in plan.boundaries.iter().enumerate() {
        println!(
            "  {:3}: pages {:5} - {:5} ({:4} pages)",
            i,
            b.start + 1,
            b.end,
            b.len()
        );
    }
}

fn print_document_stats(doc: &StructuredDocument) {
    let stats = merge_statistics(doc);
    eprintln!(
        "   {} items  ({} text, {} tables, {} pictures)  {} pages with content",
        stats.total_items, stats.text_items, stats.tables, stats.pictures, stats.unique_pages
    );
}

fn print_report(report: &ValidationReport, per_chunk: bool) {
    if per_chunk {
        for chunk in &report.chunks {
            let status = if chunk.valid { green("OK  ") } else { red("FAIL") };
            let content = chunk
                .stats
                .as_ref()
                .map(|s| format!(" [t:{}, tbl:{}, pic:{}]", s.text_items, s.tables, s.pictures))
                .unwrap_or_default();
            println!(
                "[{}] {} (pages {}-{}) {:.0}%{}",
                status,
                chunk.chunk_name,
                chunk.boundary.start + 1,
                chunk.boundary.end,
                chunk.coverage * 100.0,
                dim(&content)
            );
            for finding in report.findings_for(chunk.ordinal) {
                println!("       - {finding}");
            }
        }
        println!(
            "Chunk validation: {}/{} passed",
            report.valid_chunks(),
            report.chunks.len()
        );
    }

    let global: Vec<_> = report.global_findings().collect();
    if global.is_empty() {
        println!("- All pages covered across chunks");
    }
    for finding in global {
        println!("- {finding}");
    }
    if let Some(monotonic) = report.monotonic {
        println!(
            "- Merged page order: {}",
            if monotonic { "monotonic" } else { "NOT monotonic" }
        );
    }
    println!(
        "{}",
        if report.passed() {
            bold(&green("VALIDATION PASSED"))
        } else {
            bold(&red("VALIDATION FAILED"))
        }
    );
}
