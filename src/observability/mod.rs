//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, always on stderr)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → whatever collects the middleware's stderr
//!     → any `metrics` recorder installed by the embedding program
//! ```
//!
//! # Design Decisions
//! - stdout carries the wire protocol, so nothing else may ever write to it
//! - Exchange id flows through log fields for correlation
//! - No metrics exporter is installed here; without a recorder the counters
//!   are no-ops

pub mod logging;
pub mod metrics;
