//! Threaded backend: one OS thread and one bounded crossbeam queue per worker.
//!
//! Input is read on a separate thread; the calling thread partitions lines
//! until end of input or shutdown, whichever comes first.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};

use crate::message::Message;

use super::ingest::ingest;
use super::output::SharedWriter;
use super::reader::{Input, LineFeed};
use super::{partition, Counters, Engine, EngineError, QueueCounter, RunReport, WorkerContext};

pub(crate) fn run<R, W>(engine: &Engine, input: R, output: W) -> Result<(RunReport, W), EngineError>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let feed = LineFeed::spawn(input, engine.queue_capacity(), &engine.shutdown())?;
    let workers = engine.worker_count();
    let counters = Arc::new(Counters::default());
    let queues = QueueCounter::queues(workers);
    let writer = SharedWriter::new(output);

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for (worker, queue) in queues.iter().enumerate() {
        let (tx, rx) = bounded(engine.queue_capacity());
        let ctx = WorkerContext::new(
            Arc::clone(&engine.registry),
            Arc::clone(&counters),
            worker,
            engine.config.backend,
        );
        let queue = Arc::clone(queue);
        let writer = writer.clone();

        let handle = thread::Builder::new()
            .name(format!("gor-worker-{}", worker))
            .spawn(move || worker_loop(ctx, rx, queue, writer))
            .map_err(|source| EngineError::Spawn { worker, source })?;

        senders.push(tx);
        handles.push(handle);
    }

    let mut read_error = None;
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

        if let Some(message) = ingest(&line, &counters) {
            let queue = partition(message.id(), workers);
            if senders[queue].send(message).is_err() {
                tracing::error!(worker = queue, "Worker queue closed, draining");
                break;
            }
            queues[queue].enqueued();
        }
    }

    engine.begin_drain();
    drop(senders);

    let mut worker_error = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            tracing::error!(worker, "Worker thread panicked");
            worker_error.get_or_insert(EngineError::WorkerPanicked(worker));
        }
    }

    let report = engine.finish(&counters, &queues, read_error, worker_error)?;
    Ok((report, writer.into_inner()?))
}

fn worker_loop<W: Write>(
    ctx: WorkerContext,
    rx: Receiver<Message>,
    queue: Arc<QueueCounter>,
    writer: SharedWriter<W>,
) {
    tracing::debug!(worker = ctx.worker(), "Worker started");
    // recv fails once the reader has dropped the sender and the queue is empty
    while let Ok(message) = rx.recv() {
        let (line, kind) = ctx.process(message);
        match writer.write_line(&line) {
            Ok(()) => ctx.counters.record_emitted(Some(kind)),
            Err(e) => ctx.counters.record_write_error(ctx.worker(), &e),
        }
        queue.processed();
    }
    tracing::debug!(worker = ctx.worker(), "Worker stopped");
}
