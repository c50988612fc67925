//! Shutdown coordination for the engine.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Cloneable handle over a watch channel. Async readers wait on it;
/// blocking loops select on a [`Shutdown::listener`] channel.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    listeners: Arc<Mutex<Vec<Sender<()>>>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Triggering twice is harmless.
    pub fn trigger(&self) {
        let already = self.tx.send_replace(true);
        // dropping the senders disconnects every listener
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if !already {
            tracing::info!("Shutdown requested");
        }
    }

    /// Channel that disconnects once shutdown is triggered.
    ///
    /// Nothing is ever sent on it; `recv` returning `Err` is the signal.
    pub fn listener(&self) -> Receiver<()> {
        let (tx, rx) = crossbeam_channel::bounded(0);
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_triggered() {
            listeners.push(tx);
        }
        rx
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the shutdown has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.subscribe();
        // the sender lives in `self`, so this only returns once triggered
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
