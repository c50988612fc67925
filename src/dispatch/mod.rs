//! Publish/subscribe dispatch of messages to user callbacks.
//!
//! # Data Flow
//! ```text
//! Registration phase (before the engine starts):
//!     Registry::on(channel key, bound params, callback) → ordered subscriber list
//!
//! Per message (read-only, from any worker):
//!     message type → category channel
//!     → "message" subscribers
//!     → "<category>" subscribers
//!     → "<category>#<id>" subscribers
//!     → last returned replacement wins, otherwise the original is emitted
//! ```
//!
//! # Design Decisions
//! - The registry is owned by one engine and frozen (moved behind an `Arc`)
//!   when that engine is built; there is no global channel map
//! - Callbacks get the original message every time; a replacement returned
//!   by one callback is not seen by the next one, it only competes for the
//!   final slot
//! - Each callback runs isolated: an error or a panic is logged and counted
//!   and the remaining callbacks still run

pub mod channel;
pub mod registry;

use thiserror::Error;

use crate::config::Backend;
use crate::http::MutatorError;

pub use channel::{ChannelKey, ChannelKeyError};
pub use registry::{Dispatched, Registry};

/// What a callback may hand back: a replacement message or nothing.
pub type CallbackResult = Result<Option<crate::message::Message>, CallbackError>;

/// Failure reported by a callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error(transparent)]
    Mutator(#[from] MutatorError),

    #[error("{0}")]
    Failed(String),
}

impl CallbackError {
    pub fn failed(reason: impl Into<String>) -> Self {
        CallbackError::Failed(reason.into())
    }
}

/// Engine-side context passed to every callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    worker: usize,
    backend: Backend,
}

impl Handle {
    pub fn new(worker: usize, backend: Backend) -> Self {
        Self { worker, backend }
    }

    /// Index of the worker running the callback.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Concurrency backend the engine runs on.
    pub fn backend(&self) -> Backend {
        self.backend
    }
}
