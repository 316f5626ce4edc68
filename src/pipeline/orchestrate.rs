//! Parallel chunk conversion with process isolation.
//!
//! ## Supervisors and disposable workers
//!
//! `workers` supervisor tasks pull chunks from one shared queue. Each
//! supervisor owns at most one worker process at a time and talks to it over
//! the JSON-lines protocol in [`crate::pipeline::worker`]. After
//! `tasks_per_worker` chunks (default 1) the worker is shut down and a fresh
//! one is spawned for the next chunk, so leaks and corrupted state inside a
//! conversion library never outlive a few chunks.
//!
//! A crash, malformed reply, spawn failure or timeout kills the worker and
//! becomes a failed [`ConversionResult`] for that chunk only. The supervisor
//! carries on with a new worker.
//!
//! ## Ordering
//!
//! Supervisors send `(slot, result)` pairs over an mpsc channel; [`run`] is
//! the single writer into a slot vector keyed by input position, so results
//! come back in input order however the chunks finished.
//! [`run_unordered`] yields them in completion order instead.

use crate::error::ChunkError;
use crate::output::{ChunkArtifact, ConversionOutcome, ConversionResult};
use crate::pipeline::worker::{ChunkConverter, WorkerRequest};
use crate::progress::ProgressCallback;
use futures::Stream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Fraction of available cores used by default.
const CORE_HEADROOM: f64 = 0.8;

/// How long a worker gets to exit after its stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// `max(1, floor(available × 0.8))`.
pub fn default_worker_count(available: usize) -> usize {
    ((available as f64 * CORE_HEADROOM).floor() as usize).max(1)
}

/// [`default_worker_count`] applied to this machine's available parallelism.
pub fn machine_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    default_worker_count(available)
}

/// The program a supervisor launches as its worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Where conversions run.
#[derive(Clone)]
pub enum WorkerBackend {
    /// Separate worker processes speaking the JSON-lines protocol.
    Process(WorkerCommand),
    /// Blocking-pool threads in this process. Panics are contained but a
    /// timed-out conversion cannot be stopped, only abandoned.
    InProcess(Arc<dyn ChunkConverter>),
}

impl std::fmt::Debug for WorkerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerBackend::Process(cmd) => f.debug_tuple("Process").field(cmd).finish(),
            WorkerBackend::InProcess(_) => f.write_str("InProcess(<dyn ChunkConverter>)"),
        }
    }
}

/// Pool settings for one orchestrator run.
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent supervisors. Default: [`machine_worker_count`].
    pub workers: usize,
    /// Chunks a worker process handles before it is replaced. Default: 1.
    pub tasks_per_worker: usize,
    /// Per-chunk deadline. Default: none.
    pub task_timeout: Option<Duration>,
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: machine_worker_count(),
            tasks_per_worker: 1,
            task_timeout: None,
            progress_callback: None,
        }
    }
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("workers", &self.workers)
            .field("tasks_per_worker", &self.tasks_per_worker)
            .field("task_timeout", &self.task_timeout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ChunkProgressCallback>"),
            )
            .finish()
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Convert every artifact; results come back in input order.
///
/// Never fails as a whole: every artifact gets exactly one result.
pub async fn run(
    artifacts: &[ChunkArtifact],
    backend: &WorkerBackend,
    config: &OrchestratorConfig,
) -> Vec<ConversionResult> {
    let total = artifacts.len();
    info!(
        "Converting {} chunks with {} workers ({} tasks per worker)",
        total,
        config.workers.max(1).min(total.max(1)),
        config.tasks_per_worker.max(1)
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut slots: Vec<Option<ConversionResult>> = vec![None; total];
    let mut rx = dispatch(artifacts.to_vec(), backend.clone(), config.clone());
    while let Some((slot, result)) = rx.recv().await {
        slots[slot] = Some(result);
    }

    let results: Vec<ConversionResult> = slots
        .into_iter()
        .zip(artifacts)
        .map(|(slot, artifact)| {
            slot.unwrap_or_else(|| {
                let err = ChunkError::WorkerFault {
                    ordinal: artifact.ordinal,
                    detail: "supervisor ended without reporting a result".into(),
                };
                warn!("{err}");
                ConversionResult::from_error(artifact, &err)
            })
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.success).count();
    info!("Conversion finished: {}/{} chunks succeeded", succeeded, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, succeeded);
    }
    results
}

/// Convert every artifact, yielding results as they complete.
///
/// Sort by `ordinal` if order matters. `on_run_complete` is not fired; the
/// stream ending is the completion signal.
pub fn run_unordered(
    artifacts: &[ChunkArtifact],
    backend: &WorkerBackend,
    config: &OrchestratorConfig,
) -> impl Stream<Item = ConversionResult> + Send + 'static {
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(artifacts.len());
    }
    let rx = dispatch(artifacts.to_vec(), backend.clone(), config.clone());
    ReceiverStream::new(rx).map(|(_, result)| result)
}

/// Convert artifacts one at a time on the calling thread.
///
/// Same result contract as [`run`]; a panicking converter yields a failed
/// result for that chunk.
pub fn run_sequential(
    artifacts: &[ChunkArtifact],
    converter: &dyn ChunkConverter,
    progress: Option<&ProgressCallback>,
) -> Vec<ConversionResult> {
    let total = artifacts.len();
    info!("Converting {} chunks sequentially", total);
    if let Some(cb) = progress {
        cb.on_run_start(total);
    }

    let results: Vec<ConversionResult> = artifacts
        .iter()
        .map(|artifact| {
            if let Some(cb) = progress {
                cb.on_chunk_start(artifact.ordinal, total);
            }
            let result = match panic::catch_unwind(AssertUnwindSafe(|| {
                converter.convert(&artifact.path)
            })) {
                Ok(outcome) => ConversionResult::from_outcome(artifact, outcome),
                Err(payload) => ConversionResult::from_error(
                    artifact,
                    &ChunkError::WorkerFault {
                        ordinal: artifact.ordinal,
                        detail: format!("converter panicked: {}", panic_message(payload.as_ref())),
                    },
                ),
            };
            report(progress, &result, total);
            result
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.success).count();
    if let Some(cb) = progress {
        cb.on_run_complete(total, succeeded);
    }
    results
}

// ── Dispatch ─────────────────────────────────────────────────────────────

type Queue = Arc<Mutex<VecDeque<(usize, ChunkArtifact)>>>;

fn dispatch(
    artifacts: Vec<ChunkArtifact>,
    backend: WorkerBackend,
    config: OrchestratorConfig,
) -> mpsc::Receiver<(usize, ConversionResult)> {
    let total = artifacts.len();
    let (tx, rx) = mpsc::channel(total.max(1));
    let queue: Queue = Arc::new(Mutex::new(artifacts.into_iter().enumerate().collect()));

    let supervisors = config.workers.max(1).min(total.max(1));
    for id in 0..supervisors {
        let supervisor = Supervisor {
            id,
            queue: Arc::clone(&queue),
            backend: backend.clone(),
            config: config.clone(),
            total,
            tx: tx.clone(),
        };
        tokio::spawn(supervisor.run());
    }
    rx
}

struct Supervisor {
    id: usize,
    queue: Queue,
    backend: WorkerBackend,
    config: OrchestratorConfig,
    total: usize,
    tx: mpsc::Sender<(usize, ConversionResult)>,
}

impl Supervisor {
    async fn run(self) {
        let mut worker: Option<WorkerProcess> = None;

        loop {
            let next = self.queue.lock().await.pop_front();
            let Some((slot, artifact)) = next else { break };

            if let Some(ref cb) = self.config.progress_callback {
                cb.on_chunk_start(artifact.ordinal, self.total);
            }
            debug!("Supervisor {} took {}", self.id, artifact.file_name());

            let result = match &self.backend {
                WorkerBackend::InProcess(converter) => {
                    convert_in_process(Arc::clone(converter), &artifact, self.config.task_timeout)
                        .await
                }
                WorkerBackend::Process(command) => {
                    self.convert_in_worker(&mut worker, command, &artifact).await
                }
            };

            report(self.config.progress_callback.as_ref(), &result, self.total);
            if self.tx.send((slot, result)).await.is_err() {
                // Receiver dropped: nobody wants the remaining results.
                break;
            }
        }

        if let Some(w) = worker.take() {
            w.shutdown().await;
        }
        debug!("Supervisor {} finished", self.id);
    }

    async fn convert_in_worker(
        &self,
        worker: &mut Option<WorkerProcess>,
        command: &WorkerCommand,
        artifact: &ChunkArtifact,
    ) -> ConversionResult {
        let ordinal = artifact.ordinal;

        let mut process = match worker.take() {
            Some(p) => p,
            None => match WorkerProcess::spawn(command) {
                Ok(p) => p,
                Err(e) => {
                    let err = ChunkError::WorkerFault {
                        ordinal,
                        detail: format!("cannot start worker '{}': {e}", command.program.display()),
                    };
                    return ConversionResult::from_error(artifact, &err);
                }
            },
        };

        let reply = match self.config.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, process.request(&artifact.path)).await {
                Ok(reply) => reply,
                Err(_) => Err(ChunkError::Timeout {
                    ordinal,
                    secs: limit.as_secs_f64().ceil() as u64,
                }),
            },
            None => process.request(&artifact.path).await,
        }
        .map_err(|fault| match fault {
            ChunkError::WorkerFault { detail, .. } => ChunkError::WorkerFault { ordinal, detail },
            other => other,
        });

        match reply {
            Ok(outcome) => {
                process.tasks += 1;
                if process.tasks >= self.config.tasks_per_worker.max(1) {
                    process.shutdown().await;
                } else {
                    *worker = Some(process);
                }
                ConversionResult::from_outcome(artifact, outcome)
            }
            Err(err) => {
                warn!("{err}; replacing worker");
                process.kill().await;
                ConversionResult::from_error(artifact, &err)
            }
        }
    }
}

fn report(progress: Option<&ProgressCallback>, result: &ConversionResult, total: usize) {
    if result.success {
        debug!("Chunk {} converted", result.ordinal);
        if let Some(cb) = progress {
            cb.on_chunk_complete(result.ordinal, total);
        }
    } else {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        warn!("Chunk {} failed: {}", result.ordinal, reason);
        if let Some(cb) = progress {
            cb.on_chunk_error(result.ordinal, total, reason);
        }
    }
}

// ── In-process backend ───────────────────────────────────────────────────

async fn convert_in_process(
    converter: Arc<dyn ChunkConverter>,
    artifact: &ChunkArtifact,
    timeout: Option<Duration>,
) -> ConversionResult {
    let ordinal = artifact.ordinal;
    let path = artifact.path.clone();
    let task = tokio::task::spawn_blocking(move || converter.convert(&path));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                let err = ChunkError::Timeout {
                    ordinal,
                    secs: limit.as_secs_f64().ceil() as u64,
                };
                return ConversionResult::from_error(artifact, &err);
            }
        },
        None => task.await,
    };

    match joined {
        Ok(outcome) => ConversionResult::from_outcome(artifact, outcome),
        Err(e) => {
            let detail = if e.is_panic() {
                format!("converter panicked: {}", panic_message(e.into_panic().as_ref()))
            } else {
                "conversion task was cancelled".to_string()
            };
            ConversionResult::from_error(artifact, &ChunkError::WorkerFault { ordinal, detail })
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Worker process ───────────────────────────────────────────────────────

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    tasks: usize,
}

impl WorkerProcess {
    fn spawn(command: &WorkerCommand) -> std::io::Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout is not piped"))?;

        debug!("Spawned worker pid {:?}", child.id());
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            tasks: 0,
        })
    }

    /// Send one request and wait for its reply line. Errors carry
    /// ordinal 0; the caller fills in the real one.
    async fn request(&mut self, chunk_path: &Path) -> Result<ConversionOutcome, ChunkError> {
        let fault = |detail: String| ChunkError::WorkerFault { ordinal: 0, detail };

        let mut line = serde_json::to_string(&WorkerRequest {
            chunk_path: chunk_path.to_path_buf(),
        })
        .map_err(|e| fault(format!("cannot encode request: {e}")))?;
        line.push('\n');

        if let Err(e) = self.stdin.write_all(line.as_bytes()).await {
            return Err(fault(format!("cannot send request: {e}; {}", self.exit_description().await)));
        }
        if let Err(e) = self.stdin.flush().await {
            return Err(fault(format!("cannot send request: {e}; {}", self.exit_description().await)));
        }

        match self.stdout.next_line().await {
            Ok(Some(reply)) => serde_json::from_str(&reply)
                .map_err(|e| fault(format!("malformed reply: {e}"))),
            Ok(None) => Err(fault(format!(
                "worker closed its output; {}",
                self.exit_description().await
            ))),
            Err(e) => Err(fault(format!("cannot read reply: {e}"))),
        }
    }

    async fn exit_description(&mut self) -> String {
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => format!("worker exited with {status}"),
            Ok(Err(e)) => format!("worker status unavailable: {e}"),
            Err(_) => "worker still running".to_string(),
        }
    }

    /// Close stdin and give the worker a grace period to exit.
    async fn shutdown(self) {
        let WorkerProcess {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_err() {
            warn!("Worker did not exit after EOF; killing it");
            let _ = child.kill().await;
        }
    }

    async fn kill(mut self) {
        let _ = self.child.kill().await;
    }
}
