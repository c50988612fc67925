//! Middleware for a traffic capture/replay tool.
//!
//! Reads hex-encoded capture records from stdin, runs them through
//! registered callbacks that may rewrite the raw HTTP payload, and writes
//! the result back to stdout.
//!
//! # Architecture Overview
//!
//! ```text
//!   stdin (hex lines)
//!     │
//!     ▼
//!  ┌──────────┐    ┌───────────┐    ┌────────────────────────┐
//!  │ message  │───▶│  engine   │───▶│ worker[hash(id) mod N] │
//!  │  codec   │    │  reader   │    │   dispatch::Registry   │
//!  └──────────┘    └───────────┘    │     callbacks use      │
//!                                   │     http mutators      │
//!                                   └───────────┬────────────┘
//!                                               │ encode
//!                                               ▼
//!                                        stdout (hex lines)
//!
//!  Cross-cutting: config (TOML + CLI), rules (config-driven callbacks),
//!  lifecycle (signals, drain), observability (tracing, metrics)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gor_middleware::config::EngineConfig;
//! use gor_middleware::dispatch::{ChannelKey, Registry};
//! use gor_middleware::engine::Engine;
//! use gor_middleware::http;
//! use gor_middleware::message::MessageType;
//!
//! let mut registry = Registry::new();
//! registry.on(ChannelKey::category(MessageType::Request), (), |_, message, _| {
//!     let payload = http::set_header(message.payload(), "X-Replayed", "1");
//!     Ok(Some(message.with_payload(payload)))
//! });
//!
//! let engine = Engine::new(EngineConfig::default(), registry);
//! let report = engine.run_stdio()?;
//! eprintln!("emitted {} messages", report.emitted);
//! # Ok::<(), gor_middleware::engine::EngineError>(())
//! ```

// Core
pub mod dispatch;
pub mod engine;
pub mod http;
pub mod message;

// Configuration
pub mod config;
pub mod rules;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::MiddlewareConfig;
pub use dispatch::{ChannelKey, Registry};
pub use engine::{Engine, RunReport};
pub use lifecycle::Shutdown;
pub use message::{Message, MessageType};
