//! Processing engine.
//!
//! # Data Flow
//! ```text
//! input stream (single reader)
//!     → ingest.rs (skip blanks, decode, drop undecodable lines)
//!     → partition.rs (crc32(id) mod workers)
//!     → bounded worker queue
//!     → worker: Registry::dispatch → codec::encode
//!     → output.rs (one complete line per message, flushed)
//!     → output stream
//! ```
//!
//! # Lifecycle
//! ```text
//! Idle ──run──▶ Running ──EOF / Shutdown::trigger──▶ Draining ──queues empty──▶ Stopped
//! ```
//!
//! # Design Decisions
//! - Exactly one reader: arrival order is fixed at ingestion
//! - Messages sharing an id always land on the same queue, so their
//!   relative order survives any worker count
//! - Draining closes the queues and joins every worker; there is no
//!   timeout and no queued message is discarded
//! - An engine runs once; its registry is frozen for that run

pub mod cooperative;
pub mod ingest;
pub mod legacy;
pub mod output;
pub mod partition;
pub mod process;
mod reader;
pub mod state;
pub mod threaded;

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::watch;

use crate::config::{Backend, EngineConfig};
use crate::dispatch::{Handle, Registry};
use crate::lifecycle::{signals, Shutdown};
use crate::message::{self, Message};
use crate::observability::metrics;

pub use partition::partition;
pub use process::{serve_worker, WorkerCommand, WORKER_INDEX_ENV};
pub use state::EngineState;

/// Errors that stop or prevent an engine run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine already ran (state {0})")]
    AlreadyStarted(EngineState),

    #[error("backend {backend} cannot run through {entry}")]
    UnsupportedBackend { backend: Backend, entry: &'static str },

    #[error("failed to read input: {0}")]
    Input(#[source] io::Error),

    #[error("failed to start input reader: {0}")]
    Reader(#[source] io::Error),

    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("process backend needs a worker command")]
    MissingWorkerCommand,

    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    #[error("worker {worker} failed: {reason}")]
    WorkerFailed { worker: usize, reason: String },

    #[error("output writer is still shared after drain")]
    OutputInUse,
}

/// Enqueue/complete counts of one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueReport {
    pub queue: usize,
    pub enqueued: u64,
    pub processed: u64,
}

impl QueueReport {
    /// Items still waiting in the queue.
    pub fn pending(&self) -> u64 {
        self.enqueued.saturating_sub(self.processed)
    }
}

/// Summary of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub backend: Backend,
    pub workers: usize,
    /// Non-blank input lines.
    pub lines_read: u64,
    pub decoded: u64,
    /// Lines dropped because they could not be decoded.
    pub dropped: u64,
    /// Lines written to the output.
    pub emitted: u64,
    pub callback_failures: u64,
    pub write_errors: u64,
    pub queues: Vec<QueueReport>,
}

impl RunReport {
    /// Whether every queue was fully drained.
    pub fn drained(&self) -> bool {
        self.queues.iter().all(|q| q.pending() == 0)
    }
}

/// Live counts behind a [`QueueReport`].
#[derive(Debug, Default)]
pub(crate) struct QueueCounter {
    enqueued: AtomicU64,
    processed: AtomicU64,
}

impl QueueCounter {
    fn queues(count: usize) -> Vec<Arc<QueueCounter>> {
        (0..count).map(|_| Arc::new(QueueCounter::default())).collect()
    }

    fn enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self, queue: usize) -> QueueReport {
        QueueReport {
            queue,
            enqueued: self.enqueued.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
        }
    }
}

/// Counters shared by the reader and the workers of one run.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    lines_read: AtomicU64,
    decoded: AtomicU64,
    dropped: AtomicU64,
    emitted: AtomicU64,
    callback_failures: AtomicU64,
    write_errors: AtomicU64,
}

impl Counters {
    fn report(&self, backend: Backend, workers: usize, queues: Vec<QueueReport>) -> RunReport {
        RunReport {
            backend,
            workers,
            lines_read: self.lines_read.load(Ordering::SeqCst),
            decoded: self.decoded.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
            emitted: self.emitted.load(Ordering::SeqCst),
            callback_failures: self.callback_failures.load(Ordering::SeqCst),
            write_errors: self.write_errors.load(Ordering::SeqCst),
            queues,
        }
    }

    fn record_emitted(&self, kind: Option<message::MessageType>) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        if let Some(kind) = kind {
            metrics::record_emitted(kind);
        }
    }

    fn record_write_error(&self, worker: usize, error: &io::Error) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        metrics::record_write_error();
        tracing::error!(worker, error = %error, "Failed to write output line");
    }
}

/// Everything a worker needs to turn a message into an output line.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    handle: Handle,
}

impl WorkerContext {
    fn new(registry: Arc<Registry>, counters: Arc<Counters>, worker: usize, backend: Backend) -> Self {
        Self {
            registry,
            counters,
            handle: Handle::new(worker, backend),
        }
    }

    fn worker(&self) -> usize {
        self.handle.worker()
    }

    /// Dispatch and encode. Returns the line and the emitted message's type.
    fn process(&self, message: Message) -> (Vec<u8>, message::MessageType) {
        let id = message.id().to_string();
        let dispatched = self.registry.dispatch(&self.handle, message);
        if dispatched.failures > 0 {
            self.counters
                .callback_failures
                .fetch_add(dispatched.failures as u64, Ordering::Relaxed);
        }

        tracing::trace!(
            worker = self.worker(),
            id = %id,
            invoked = dispatched.invoked,
            replaced = dispatched.replaced,
            "Message dispatched"
        );

        (message::encode(&dispatched.message), dispatched.message.kind())
    }
}

/// One middleware run: a frozen registry, a worker pool and a lifecycle.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    registry: Arc<Registry>,
    shutdown: Shutdown,
    state: state::StateCell,
    worker_command: Option<WorkerCommand>,
}

impl Engine {
    /// Build an engine. The registry cannot be changed afterwards.
    pub fn new(config: EngineConfig, registry: Registry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            shutdown: Shutdown::new(),
            state: state::StateCell::new(),
            worker_command: None,
        }
    }

    /// Command used to start worker processes (process backend only).
    ///
    /// On that backend the engine's own registry is never consulted: each
    /// child dispatches through whatever registry the command builds. The
    /// queue to a child is its stdin pipe, bounded by the OS pipe buffer
    /// rather than `queue_capacity`, which only bounds the input reader.
    pub fn with_worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = Some(command);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle that starts the drain when triggered.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Watch state transitions.
    pub fn state_watch(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    fn worker_count(&self) -> usize {
        self.config.workers.max(1)
    }

    fn queue_capacity(&self) -> usize {
        self.config.queue_capacity.max(1)
    }

    fn start(&self) -> Result<(), EngineError> {
        self.state.start().map_err(EngineError::AlreadyStarted)?;
        tracing::info!(
            backend = %self.config.backend,
            workers = self.worker_count(),
            queue_capacity = self.queue_capacity(),
            callbacks = self.registry.len(),
            "Engine running"
        );
        Ok(())
    }

    fn begin_drain(&self) {
        self.state.set(EngineState::Draining);
        tracing::info!("Engine draining");
    }

    /// Close out a run once every worker has been joined.
    ///
    /// A read error takes precedence over a worker failure.
    fn finish(
        &self,
        counters: &Counters,
        queues: &[Arc<QueueCounter>],
        read_error: Option<io::Error>,
        worker_error: Option<EngineError>,
    ) -> Result<RunReport, EngineError> {
        self.state.set(EngineState::Stopped);

        let queues = queues
            .iter()
            .enumerate()
            .map(|(i, q)| q.report(i))
            .collect();
        let report = counters.report(self.config.backend, self.worker_count(), queues);

        tracing::info!(
            lines = report.lines_read,
            dropped = report.dropped,
            emitted = report.emitted,
            callback_failures = report.callback_failures,
            write_errors = report.write_errors,
            drained = report.drained(),
            "Engine stopped"
        );

        if let Some(e) = read_error {
            return Err(EngineError::Input(e));
        }
        if let Some(e) = worker_error {
            return Err(e);
        }
        Ok(report)
    }

    /// Run a task-based backend (`cooperative` or `legacy`) over async streams.
    ///
    /// Returns the run report and the output writer once every queue has
    /// been drained.
    pub async fn run_async<R, W>(&self, input: R, output: W) -> Result<(RunReport, W), EngineError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let backend = self.config.backend;
        match backend {
            Backend::Cooperative => {
                self.start()?;
                cooperative::run(self, input, output).await
            }
            Backend::Legacy => {
                self.start()?;
                legacy::run(self, input, output).await
            }
            Backend::Threaded | Backend::Process => Err(EngineError::UnsupportedBackend {
                backend,
                entry: "run_async",
            }),
        }
    }

    /// Run a thread- or process-based backend over blocking streams.
    ///
    /// `input` is read on its own thread so that [`Shutdown::trigger`]
    /// starts the drain even while a read is blocked. A reader still
    /// blocked when the run ends is left behind.
    pub fn run_blocking<R, W>(&self, input: R, output: W) -> Result<(RunReport, W), EngineError>
    where
        R: io::BufRead + Send + 'static,
        W: io::Write + Send + 'static,
    {
        let backend = self.config.backend;
        match backend {
            Backend::Threaded => {
                self.start()?;
                threaded::run(self, input, output)
            }
            Backend::Process => {
                let command = self
                    .worker_command
                    .clone()
                    .ok_or(EngineError::MissingWorkerCommand)?;
                self.start()?;
                process::run(self, &command, input, output)
            }
            Backend::Cooperative | Backend::Legacy => Err(EngineError::UnsupportedBackend {
                backend,
                entry: "run_blocking",
            }),
        }
    }

    /// Run on the process's stdin/stdout until end of input or a signal.
    ///
    /// SIGINT/SIGTERM trigger a drain on every backend, including while
    /// stdin is open but idle.
    pub fn run_stdio(&self) -> Result<RunReport, EngineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;

        let result = runtime.block_on(async {
            let listener = signals::spawn_signal_listener(self.shutdown());

            let result = match self.config.backend {
                Backend::Cooperative | Backend::Legacy => {
                    let input = tokio::io::BufReader::new(tokio::io::stdin());
                    self.run_async(input, tokio::io::stdout())
                        .await
                        .map(|(report, _)| report)
                }
                Backend::Threaded | Backend::Process => {
                    let engine = self.clone();
                    tokio::task::spawn_blocking(move || {
                        engine
                            .run_blocking(io::BufReader::new(io::stdin()), io::stdout())
                            .map(|(report, _)| report)
                    })
                    .await
                    .unwrap_or_else(|_| Err(EngineError::WorkerPanicked(0)))
                }
            };

            listener.abort();
            result
        });

        // a stdin read may still be parked after a signal
        runtime.shutdown_background();
        result
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("state", &self.state.get())
            .finish()
    }
}
