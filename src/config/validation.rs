//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers and queue capacity > 0)
//! - Check that rules name real channels and carry usable values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MiddlewareConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::config::schema::{MiddlewareConfig, RuleAction};
use crate::rules;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &MiddlewareConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.engine.workers == 0 {
        errors.push(ValidationError::new("engine.workers", "must be at least 1"));
    }
    if config.engine.queue_capacity == 0 {
        errors.push(ValidationError::new("engine.queue_capacity", "must be at least 1"));
    }
    if EnvFilter::try_new(&config.logging.level).is_err() {
        errors.push(ValidationError::new(
            "logging.level",
            format!("invalid level or filter {:?}", config.logging.level),
        ));
    }

    for (i, rule) in config.rules.iter().enumerate() {
        let field = |name: &str| format!("rules[{i}].{name}");

        if let Err(e) = rules::channel_key(rule) {
            errors.push(ValidationError::new(field("channel"), e.to_string()));
        }
        if let Some(id) = &rule.id {
            if id.contains(' ') {
                errors.push(ValidationError::new(field("id"), "exchange ids cannot contain spaces"));
            }
        }

        match &rule.action {
            RuleAction::SetHeader { name, .. }
            | RuleAction::DeleteHeader { name }
            | RuleAction::SetPathParam { name, .. }
            | RuleAction::SetCookie { name, .. }
            | RuleAction::DeleteCookie { name } => {
                if name.trim().is_empty() {
                    errors.push(ValidationError::new(field("action.name"), "cannot be empty"));
                }
                if name.contains(':') || name.contains('=') || name.contains(';') {
                    errors.push(ValidationError::new(
                        field("action.name"),
                        format!("{name:?} contains a separator character"),
                    ));
                }
            }
            RuleAction::SetPath { path } => {
                if path.is_empty() || path.contains(' ') {
                    errors.push(ValidationError::new(
                        field("action.path"),
                        "must be non-empty and contain no spaces",
                    ));
                }
            }
            RuleAction::SetStatus { status } => {
                if status.is_empty() || status.contains(' ') {
                    errors.push(ValidationError::new(
                        field("action.status"),
                        "must be non-empty and contain no spaces",
                    ));
                }
            }
            RuleAction::SetBody { .. } | RuleAction::Log => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
