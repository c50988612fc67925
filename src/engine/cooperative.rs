//! Cooperative backend: tokio tasks on the caller's runtime.
//!
//! One bounded `mpsc` queue per worker task. Tasks only suspend on queue
//! operations and output writes; the reader yields between lines so workers
//! get scheduled on a current-thread runtime.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::Message;

use super::ingest::ingest;
use super::output::AsyncSharedWriter;
use super::{partition, Counters, Engine, EngineError, QueueCounter, RunReport, WorkerContext};

pub(crate) async fn run<R, W>(
    engine: &Engine,
    mut input: R,
    output: W,
) -> Result<(RunReport, W), EngineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let workers = engine.worker_count();
    let capacity = engine.queue_capacity();
    let counters = Arc::new(Counters::default());
    let queues = QueueCounter::queues(workers);
    let writer = AsyncSharedWriter::new(output);

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for (worker, queue) in queues.iter().enumerate() {
        let (tx, rx) = mpsc::channel(capacity);
        let ctx = WorkerContext::new(
            Arc::clone(&engine.registry),
            Arc::clone(&counters),
            worker,
            engine.config.backend,
        );
        senders.push(tx);
        handles.push(spawn_worker(ctx, rx, Arc::clone(queue), writer.clone()));
    }

    let shutdown = engine.shutdown();
    let mut line = Vec::new();
    let mut read_error = None;
    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            read = input.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Input read failed, draining");
                read_error = Some(e);
                break;
            }
        }

        if let Some(message) = ingest(&line, &counters) {
            let queue = partition(message.id(), workers);
            if senders[queue].send(message).await.is_err() {
                tracing::error!(worker = queue, "Worker queue closed, draining");
                break;
            }
            queues[queue].enqueued();
        }

        tokio::task::yield_now().await;
    }

    engine.begin_drain();
    drop(senders);

    let mut worker_error = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        if handle.await.is_err() {
            tracing::error!(worker, "Worker task panicked");
            worker_error.get_or_insert(EngineError::WorkerPanicked(worker));
        }
    }

    let report = engine.finish(&counters, &queues, read_error, worker_error)?;
    Ok((report, writer.into_inner()?))
}

fn spawn_worker<W>(
    ctx: WorkerContext,
    mut rx: mpsc::Receiver<Message>,
    queue: Arc<QueueCounter>,
    writer: AsyncSharedWriter<W>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        tracing::debug!(worker = ctx.worker(), "Worker started");
        while let Some(message) = rx.recv().await {
            let (line, kind) = ctx.process(message);
            match writer.write_line(&line).await {
                Ok(()) => ctx.counters.record_emitted(Some(kind)),
                Err(e) => ctx.counters.record_write_error(ctx.worker(), &e),
            }
            queue.processed();
        }
        tracing::debug!(worker = ctx.worker(), "Worker stopped");
    })
}
