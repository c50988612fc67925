//! Per-exchange ordering and drain across in-process backends.

use std::io::Cursor;

use tokio::io::AsyncWriteExt;

use gor_middleware::config::Backend;
use gor_middleware::dispatch::{ChannelKey, Registry};
use gor_middleware::engine::{Engine, EngineState};
use gor_middleware::http;
use gor_middleware::message::MessageType;

mod common;

const IDS: usize = 12;
const PER_ID: usize = 10;

fn assert_ordered(observed: &common::Observed) {
    for id in 0..IDS {
        let seqs = common::sequence_for(observed, &format!("ex{}", id));
        assert_eq!(seqs, (0..PER_ID).collect::<Vec<_>>(), "ex{} out of order", id);
    }
}

#[tokio::test]
async fn test_cooperative_order_for_any_worker_count() {
    for workers in [1, 2, 3, 8] {
        let (registry, observed) = common::recording_registry();
        let engine = Engine::new(common::engine_config(Backend::Cooperative, workers), registry);
        let input = common::interleaved_input(IDS, PER_ID);

        let (report, output) = engine.run_async(input.as_bytes(), Vec::new()).await.unwrap();

        assert_eq!(report.emitted as usize, IDS * PER_ID);
        assert!(report.drained());
        assert_eq!(common::decode_lines(&output).len(), IDS * PER_ID);
        assert_ordered(&observed);
    }
}

#[test]
fn test_threaded_order_for_any_worker_count() {
    for workers in [1, 2, 5] {
        let (registry, observed) = common::recording_registry();
        let engine = Engine::new(common::engine_config(Backend::Threaded, workers), registry);
        let input = common::interleaved_input(IDS, PER_ID);

        let (report, output) = engine.run_blocking(Cursor::new(input), Vec::new()).unwrap();

        assert_eq!(report.queues.len(), workers);
        assert_eq!(report.queues.iter().map(|q| q.processed).sum::<u64>() as usize, IDS * PER_ID);
        assert_eq!(common::decode_lines(&output).len(), IDS * PER_ID);
        assert_ordered(&observed);
        assert_eq!(engine.state(), EngineState::Stopped);
    }
}

#[tokio::test]
async fn test_legacy_single_worker_is_fifo() {
    let (registry, observed) = common::recording_registry();
    let engine = Engine::new(common::engine_config(Backend::Legacy, 1), registry);
    let input = common::interleaved_input(IDS, PER_ID);

    let (report, _) = engine.run_async(input.as_bytes(), Vec::new()).await.unwrap();

    assert_eq!(report.queues.len(), 1);
    assert!(report.drained());
    assert_ordered(&observed);
}

#[tokio::test]
async fn test_exchange_response_rewrite() {
    let mut registry = Registry::new();
    registry.on(ChannelKey::exchange(MessageType::Response, "ex3"), (), |_, msg, _| {
        Ok(Some(msg.with_payload(http::set_status(msg.payload(), "503")?)))
    });

    let engine = Engine::new(common::engine_config(Backend::Cooperative, 4), registry);
    let mut input = String::new();
    for id in 0..6 {
        input.push_str(&common::line(1, &format!("ex{}", id), "GET / HTTP/1.1\r\n\r\n"));
        input.push_str(&common::line(2, &format!("ex{}", id), "HTTP/1.1 200 OK\r\n\r\n"));
    }

    let (_, output) = engine.run_async(input.as_bytes(), Vec::new()).await.unwrap();
    let messages = common::decode_lines(&output);
    assert_eq!(messages.len(), 12);

    for message in messages.iter().filter(|m| m.kind() == MessageType::Response) {
        let expected = if message.id() == "ex3" { "503" } else { "200" };
        assert_eq!(http::status(message.payload()), Some(expected), "{}", message.id());
    }
}

#[tokio::test]
async fn test_shutdown_mid_run_drains_queued_messages() {
    let (registry, _) = common::recording_registry();
    let engine = Engine::new(common::engine_config(Backend::Cooperative, 2), registry);
    let shutdown = engine.shutdown();

    let (mut tx, rx) = tokio::io::duplex(1 << 16);
    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .run_async(tokio::io::BufReader::new(rx), Vec::new())
                .await
        })
    };

    tx.write_all(common::interleaved_input(4, 4).as_bytes()).await.unwrap();
    tx.flush().await.unwrap();

    let mut state = engine.state_watch();
    state.wait_for(|s| *s == EngineState::Running).await.unwrap();
    // input stays open; only the shutdown ends the run
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown.trigger();

    let (report, output) = runner.await.unwrap().unwrap();
    assert!(report.drained());
    assert_eq!(report.emitted, report.decoded);
    assert_eq!(common::decode_lines(&output).len() as u64, report.decoded);
    assert_eq!(engine.state(), EngineState::Stopped);
    drop(tx);
}

#[test]
fn test_async_backends_rejected_by_blocking_entry() {
    for backend in [Backend::Cooperative, Backend::Legacy] {
        let engine = Engine::new(common::engine_config(backend, 1), Registry::new());
        assert!(engine.run_blocking(Cursor::new(""), Vec::new()).is_err());
        assert_eq!(engine.state(), EngineState::Idle);
    }
}
