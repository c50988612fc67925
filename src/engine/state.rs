//! Engine lifecycle state.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Where an engine is in its single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// Input closed or shutdown requested; queued messages are still being processed.
    Draining,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Draining => "draining",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, observable engine state.
#[derive(Debug, Clone)]
pub(crate) struct StateCell {
    tx: Arc<watch::Sender<EngineState>>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(EngineState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn get(&self) -> EngineState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.tx.subscribe()
    }

    /// Move Idle → Running. Any other state is returned as the error.
    pub(crate) fn start(&self) -> Result<(), EngineState> {
        let mut current = EngineState::Idle;
        let started = self.tx.send_if_modified(|state| {
            current = *state;
            if *state == EngineState::Idle {
                *state = EngineState::Running;
                true
            } else {
                false
            }
        });

        if started {
            Ok(())
        } else {
            Err(current)
        }
    }

    pub(crate) fn set(&self, next: EngineState) {
        let previous = self.tx.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Engine state changed");
        }
    }
}
