//! Legacy backend: one shared FIFO queue, no partitioning.
//!
//! N tasks take turns on a single bounded queue. Total arrival order is
//! kept at dequeue time, but two messages with the same id may be
//! processed by different tasks.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::{mpsc, Mutex};

use crate::message::Message;

use super::ingest::ingest;
use super::output::AsyncSharedWriter;
use super::{Counters, Engine, EngineError, QueueCounter, RunReport, WorkerContext};

pub(crate) async fn run<R, W>(
    engine: &Engine,
    mut input: R,
    output: W,
) -> Result<(RunReport, W), EngineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let counters = Arc::new(Counters::default());
    let queues = QueueCounter::queues(1);
    let queue = Arc::clone(&queues[0]);
    let writer = AsyncSharedWriter::new(output);

    let (tx, rx) = mpsc::channel::<Message>(engine.queue_capacity());
    let rx = Arc::new(Mutex::new(rx));

    let mut handles = Vec::with_capacity(engine.worker_count());
    for worker in 0..engine.worker_count() {
        let ctx = WorkerContext::new(
            Arc::clone(&engine.registry),
            Arc::clone(&counters),
            worker,
            engine.config.backend,
        );
        let rx = Arc::clone(&rx);
        let queue = Arc::clone(&queue);
        let writer = writer.clone();

        handles.push(tokio::spawn(async move {
            tracing::debug!(worker, "Worker started");
            loop {
                let next = rx.lock().await.recv().await;
                let Some(message) = next else { break };

                let (line, kind) = ctx.process(message);
                match writer.write_line(&line).await {
                    Ok(()) => ctx.counters.record_emitted(Some(kind)),
                    Err(e) => ctx.counters.record_write_error(worker, &e),
                }
                queue.processed();
            }
            tracing::debug!(worker, "Worker stopped");
        }));
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
            if tx.send(message).await.is_err() {
                tracing::error!("Shared queue closed, draining");
                break;
            }
            queue.enqueued();
        }

        tokio::task::yield_now().await;
    }

    engine.begin_drain();
    drop(tx);

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
