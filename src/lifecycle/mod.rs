//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → reader stops enqueuing → engine drains every queue → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger (drain, never abort)
//! ```
//!
//! # Design Decisions
//! - Interrupt and end-of-input take the same path: drain, then stop
//! - No drain deadline: every message already queued is emitted

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
