//! Process backend: one child process per worker.
//!
//! # Data Flow
//! ```text
//! reader ──partition──▶ child[i].stdin   (the inter-process queue)
//!                       child[i] runs serve_worker over its stdin/stdout
//! child[i].stdout ──pump thread──▶ shared output (one line at a time)
//! ```
//!
//! # Design Decisions
//! - Children never share the parent's registry; they rebuild their own
//!   from whatever the worker command hands them (the CLI passes the rule
//!   set through an environment variable)
//! - Lines are forwarded to children as read, so a child decodes exactly
//!   the bytes the parent partitioned
//! - Drain closes every stdin; children exit at end of input, pumps
//!   finish at end of output, then children are reaped
//! - On unix each child gets its own process group, so a terminal
//!   interrupt never reaches it directly
//! - Per-child queues are the stdin pipes, bounded by the OS pipe buffer

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Backend;
use crate::dispatch::Registry;
use crate::lifecycle::signals;
use crate::message;

use super::ingest::ingest;
use super::output::SharedWriter;
use super::reader::{Input, LineFeed};
use super::{partition, Counters, Engine, EngineError, QueueCounter, RunReport, WorkerContext};

/// Environment variable carrying a child's worker index.
pub const WORKER_INDEX_ENV: &str = "GOR_MIDDLEWARE_WORKER_INDEX";

/// How to start one worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// The running executable.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn spawn(&self, worker: usize) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(WORKER_INDEX_ENV, worker.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        // own process group: a terminal interrupt reaches only the parent,
        // which drains the child by closing its stdin
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn()
    }
}

struct WorkerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    pump: JoinHandle<()>,
}

pub(crate) fn run<R, W>(
    engine: &Engine,
    command: &WorkerCommand,
    input: R,
    output: W,
) -> Result<(RunReport, W), EngineError>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let feed = LineFeed::spawn(input, engine.queue_capacity(), &engine.shutdown())?;
    let workers = engine.worker_count();
    let counters = Arc::new(Counters::default());
    let queues = QueueCounter::queues(workers);
    let writer = SharedWriter::new(output);

    let mut processes: Vec<WorkerProcess> = Vec::with_capacity(workers);
    for (worker, queue) in queues.iter().enumerate() {
        match start_worker(command, worker, &counters, queue, &writer) {
            Ok(process) => processes.push(process),
            Err(e) => {
                for mut process in processes {
                    let _ = process.child.kill();
                    let _ = process.child.wait();
                }
                return Err(e);
            }
        }
    }

    let mut read_error = None;
    let mut worker_error = None;
    loop {
        let line = match feed.next() {
            Input::Line(line) => line,
            Input::Eof | Input::Shutdown => break,
            Input::Failed(e) => {
                tracing::error!(error = %e, "Input read failed, draining");
                read_error = Some(e);
                break;
            }
        };

        let Some(message) = ingest(&line, &counters) else {
            continue;
        };
        let worker = partition(message.id(), workers);
        let Some(stdin) = processes[worker].stdin.as_mut() else {
            continue;
        };

        match forward(stdin, line.trim_ascii()) {
            Ok(()) => queues[worker].enqueued(),
            Err(e) => {
                tracing::error!(worker, error = %e, "Worker input closed, draining");
                worker_error = Some(EngineError::WorkerFailed {
                    worker,
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    engine.begin_drain();
    for process in &mut processes {
        process.stdin.take();
    }

    for (worker, process) in processes.into_iter().enumerate() {
        let WorkerProcess { mut child, pump, .. } = process;
        if pump.join().is_err() {
            tracing::error!(worker, "Output pump panicked");
            worker_error.get_or_insert(EngineError::WorkerPanicked(worker));
        }

        match child.wait() {
            Ok(status) if status.success() => {
                tracing::debug!(worker, "Worker process exited");
            }
            Ok(status) => {
                tracing::error!(worker, status = %status, "Worker process failed");
                worker_error.get_or_insert(EngineError::WorkerFailed {
                    worker,
                    reason: status.to_string(),
                });
            }
            Err(e) => {
                worker_error.get_or_insert(EngineError::WorkerFailed {
                    worker,
                    reason: e.to_string(),
                });
            }
        }
    }

    let report = engine.finish(&counters, &queues, read_error, worker_error)?;
    Ok((report, writer.into_inner()?))
}

fn start_worker<W>(
    command: &WorkerCommand,
    worker: usize,
    counters: &Arc<Counters>,
    queue: &Arc<QueueCounter>,
    writer: &SharedWriter<W>,
) -> Result<WorkerProcess, EngineError>
where
    W: Write + Send + 'static,
{
    let mut child = command
        .spawn(worker)
        .map_err(|source| EngineError::Spawn { worker, source })?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(EngineError::WorkerFailed {
            worker,
            reason: "missing stdio pipes".to_string(),
        });
    };

    let counters = Arc::clone(counters);
    let queue = Arc::clone(queue);
    let writer = writer.clone();
    let spawned = thread::Builder::new()
        .name(format!("gor-pump-{}", worker))
        .spawn(move || pump(worker, stdout, counters, queue, writer));

    match spawned {
        Ok(pump) => {
            tracing::debug!(worker, pid = child.id(), "Worker process started");
            Ok(WorkerProcess {
                child,
                stdin: Some(stdin),
                pump,
            })
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(EngineError::Spawn { worker, source })
        }
    }
}

fn forward(stdin: &mut ChildStdin, line: &[u8]) -> io::Result<()> {
    stdin.write_all(line)?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

/// Copy a child's output lines to the shared writer.
fn pump<W: Write>(
    worker: usize,
    stdout: ChildStdout,
    counters: Arc<Counters>,
    queue: Arc<QueueCounter>,
    writer: SharedWriter<W>,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!(worker, error = %e, "Failed to read worker output");
                break;
            }
        }

        if line.trim_ascii().is_empty() {
            continue;
        }
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }

        match writer.write_line(&line) {
            Ok(()) => counters.record_emitted(message::peek_type(&line)),
            Err(e) => counters.record_write_error(worker, &e),
        }
        queue.processed();
    }
}

/// Child side of the process backend: serve one worker over a stream pair.
///
/// Reads encoded lines until end of input, dispatches each through
/// `registry` and writes the result as soon as it is ready.
pub fn serve_worker<R, W>(
    registry: Registry,
    worker: usize,
    mut input: R,
    mut output: W,
) -> Result<RunReport, EngineError>
where
    R: BufRead,
    W: Write,
{
    let counters = Arc::new(Counters::default());
    let queue = QueueCounter::default();
    let ctx = WorkerContext::new(Arc::new(registry), Arc::clone(&counters), worker, Backend::Process);

    tracing::debug!(worker, "Worker serving");
    let mut line = Vec::new();
    loop {
        line.clear();
        match input.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EngineError::Input(e)),
        }

        let Some(message) = ingest(&line, &counters) else {
            continue;
        };
        queue.enqueued();

        let (encoded, kind) = ctx.process(message);
        let written = output.write_all(&encoded).and_then(|_| output.flush());
        match written {
            Ok(()) => counters.record_emitted(Some(kind)),
            Err(e) => counters.record_write_error(worker, &e),
        }
        queue.processed();
    }

    Ok(counters.report(Backend::Process, 1, vec![queue.report(worker)]))
}

/// Run [`serve_worker`] on stdin/stdout.
///
/// Interrupts are swallowed: the parent owns the drain and closes this
/// worker's input when it is done.
pub fn serve_stdio(registry: Registry, worker: usize) -> Result<RunReport, EngineError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(EngineError::Runtime)?;

    let result = runtime.block_on(async move {
        let ignore = tokio::spawn(async move {
            loop {
                signals::wait_for_signal().await;
                tracing::debug!(worker, "Worker ignoring signal, waiting for end of input");
            }
        });

        let result = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            serve_worker(registry, worker, stdin.lock(), io::stdout().lock())
        })
        .await
        .unwrap_or_else(|_| Err(EngineError::WorkerPanicked(worker)));

        ignore.abort();
        result
    });

    runtime.shutdown_background();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dispatch::ChannelKey;
    use crate::message::MessageType;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Duration;

    /// Serves its data, then blocks like an open pipe nobody writes to.
    struct OpenPipe {
        data: Cursor<Vec<u8>>,
        hold: crossbeam_channel::Receiver<()>,
    }

    impl Read for OpenPipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                let _ = self.hold.recv();
            }
            Ok(n)
        }
    }

    fn process_engine(workers: usize, registry: Registry, program: &str) -> Engine {
        let config = EngineConfig {
            backend: Backend::Process,
            workers,
            queue_capacity: 16,
        };
        Engine::new(config, registry).with_worker_command(WorkerCommand::new(program))
    }

    fn line(kind: &str, id: &str, payload: &str) -> String {
        format!("{}\n", hex::encode(format!("{} {} 1\n{}", kind, id, payload)))
    }

    #[test]
    fn test_serve_worker_applies_registry() {
        let mut registry = Registry::new();
        registry.on(ChannelKey::exchange(MessageType::Response, "r1"), (), |_, msg, _| {
            Ok(Some(msg.with_payload(b"HTTP/1.1 204 No Content\r\n\r\n".to_vec())))
        });

        let input = format!(
            "{}{}garbage\n",
            line("2", "r1", "HTTP/1.1 200 OK\r\n\r\n"),
            line("2", "r2", "HTTP/1.1 200 OK\r\n\r\n"),
        );
        let mut output = Vec::new();
        let report = serve_worker(registry, 0, Cursor::new(input), &mut output).unwrap();

        assert_eq!(report.emitted, 2);
        assert_eq!(report.dropped, 1);

        let lines: Vec<&[u8]> = output.split(|b| *b == b'\n').filter(|l| !l.is_empty()).collect();
        assert_eq!(message::decode(lines[0]).unwrap().payload(), b"HTTP/1.1 204 No Content\r\n\r\n");
        assert_eq!(message::decode(lines[1]).unwrap().payload(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn test_worker_command_builder() {
        let command = WorkerCommand::new("prog").arg("worker").env("KEY", "value");
        assert_eq!(command.program, OsString::from("prog"));
        assert_eq!(command.args, vec![OsString::from("worker")]);
        assert_eq!(command.envs.len(), 1);
    }

    #[test]
    fn test_requires_worker_command() {
        let config = EngineConfig {
            backend: Backend::Process,
            ..EngineConfig::default()
        };
        let engine = Engine::new(config, Registry::new());
        let err = engine.run_blocking(Cursor::new(""), Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::MissingWorkerCommand));
        assert_eq!(engine.state(), super::super::EngineState::Idle);
    }

    #[cfg(unix)]
    #[test]
    fn test_children_echo_through_pipes() {
        let config = EngineConfig {
            backend: Backend::Process,
            workers: 3,
            queue_capacity: 16,
        };
        let engine = Engine::new(config, Registry::new()).with_worker_command(WorkerCommand::new("cat"));

        let input: String = (0..30).map(|i| line("1", &format!("id{}", i), "GET / HTTP/1.1\r\n\r\n")).collect();
        let (report, output) = engine.run_blocking(Cursor::new(input), Vec::new()).unwrap();

        assert_eq!(report.emitted, 30);
        assert!(report.drained());
        assert_eq!(report.queues.len(), 3);
        for raw in output.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            assert_eq!(message::decode(raw).unwrap().kind(), MessageType::Request);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_child_is_reported() {
        let config = EngineConfig {
            backend: Backend::Process,
            workers: 1,
            queue_capacity: 16,
        };
        let engine = Engine::new(config, Registry::new()).with_worker_command(WorkerCommand::new("false"));

        let err = engine.run_blocking(Cursor::new(""), Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::WorkerFailed { worker: 0, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_shutdown_drains_children_while_input_idle() {
        let (_release, hold) = crossbeam_channel::bounded::<()>(0);
        let data: String = (0..9).map(|i| line("1", &format!("id{}", i), "GET / HTTP/1.1\r\n\r\n")).collect();
        let input = BufReader::new(OpenPipe {
            data: Cursor::new(data.into_bytes()),
            hold,
        });

        let engine = process_engine(3, Registry::new(), "cat");
        let shutdown = engine.shutdown();
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            shutdown.trigger();
        });

        let (report, output) = engine.run_blocking(input, Vec::new()).unwrap();
        trigger.join().unwrap();

        assert!(report.drained());
        assert_eq!(report.emitted, 9);
        assert_eq!(output.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count(), 9);
        assert_eq!(engine.state(), super::super::EngineState::Stopped);
    }

    #[cfg(unix)]
    #[test]
    fn test_local_registry_is_not_used_by_children() {
        let mut registry = Registry::new();
        registry.on(ChannelKey::message(), (), |_, msg, _| Ok(Some(msg.with_payload(b"local".to_vec()))));

        let engine = process_engine(2, registry, "cat");
        let input = line("1", "a", "GET / HTTP/1.1\r\n\r\n");
        let (_, output) = engine.run_blocking(Cursor::new(input), Vec::new()).unwrap();

        assert_eq!(message::decode(&output).unwrap().payload(), b"GET / HTTP/1.1\r\n\r\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_children_lead_their_own_process_group() {
        // fields 1 and 5 of /proc/<pid>/stat are pid and process group
        let command = WorkerCommand::new("sh")
            .arg("-c")
            .arg(r#"set -- $(cat /proc/$$/stat); [ "$1" = "$5" ] || exit 3; exec cat"#);
        let config = EngineConfig {
            backend: Backend::Process,
            workers: 2,
            queue_capacity: 16,
        };
        let engine = Engine::new(config, Registry::new()).with_worker_command(command);

        let input: String = (0..4).map(|i| line("1", &i.to_string(), "x")).collect();
        let (report, _) = engine.run_blocking(Cursor::new(input), Vec::new()).unwrap();
        assert_eq!(report.emitted, 4);
    }
}
