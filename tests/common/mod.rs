//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};

use gor_middleware::config::{Backend, EngineConfig};
use gor_middleware::dispatch::{ChannelKey, Registry};
use gor_middleware::message::{self, Message};

/// Encode one wire line (with trailing newline).
#[allow(dead_code)]
pub fn line(kind: u8, id: &str, payload: &str) -> String {
    format!("{}\n", hex::encode(format!("{} {} 1\n{}", kind, id, payload)))
}

/// Decode every non-empty line of an output buffer.
#[allow(dead_code)]
pub fn decode_lines(output: &[u8]) -> Vec<Message> {
    output
        .split(|b| *b == b'\n')
        .filter(|l| !l.is_empty())
        .map(|l| message::decode(l).unwrap())
        .collect()
}

#[allow(dead_code)]
pub fn engine_config(backend: Backend, workers: usize) -> EngineConfig {
    EngineConfig {
        backend,
        workers,
        queue_capacity: 8,
    }
}

/// `ids` exchanges with `per_id` messages each, interleaved round-robin.
/// Each payload is `<id>:<sequence>`.
#[allow(dead_code)]
pub fn interleaved_input(ids: usize, per_id: usize) -> String {
    let mut input = String::new();
    for seq in 0..per_id {
        for id in 0..ids {
            let kind = if seq % 2 == 0 { 1 } else { 2 };
            input.push_str(&line(kind, &format!("ex{}", id), &format!("ex{}:{}", id, seq)));
        }
    }
    input
}

#[allow(dead_code)]
pub type Observed = Arc<Mutex<Vec<(String, usize)>>>;

/// Registry that records `(id, sequence)` for every message it sees.
#[allow(dead_code)]
pub fn recording_registry() -> (Registry, Observed) {
    let observed: Observed = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    registry.on(ChannelKey::message(), Arc::clone(&observed), |_, msg, observed| {
        let payload = String::from_utf8_lossy(msg.payload()).to_string();
        let seq = payload
            .rsplit(':')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(usize::MAX);
        observed.lock().unwrap().push((msg.id().to_string(), seq));
        Ok(None)
    });
    (registry, observed)
}

/// Sequences seen for `id`, in observation order.
#[allow(dead_code)]
pub fn sequence_for(observed: &Observed, id: &str) -> Vec<usize> {
    observed
        .lock()
        .unwrap()
        .iter()
        .filter(|(seen, _)| seen == id)
        .map(|(_, seq)| *seq)
        .collect()
}
