//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MiddlewareConfig (validated, immutable)
//!     → CLI overrides applied by the binary
//!     → engine + rules built from it
//!
//! Process backend:
//!     rules → JSON snapshot (rules::RuleSet) → worker processes rebuild
//!     the same registry from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the engine starts; there is no reload
//! - All fields have defaults, an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{Backend, EngineConfig, LogFormat, LoggingConfig, MiddlewareConfig, RuleAction, RuleConfig};
pub use validation::{validate_config, ValidationError};
