//! Config-driven callbacks.
//!
//! # Responsibilities
//! - Turn `[[rules]]` entries into registry subscribers
//! - Serialize the rule set so worker processes can rebuild the same registry
//!
//! # Design Decisions
//! - Rules follow normal dispatch semantics: each sees the message as it
//!   was read and the last rule returning a replacement wins. Two rules on
//!   the same message do not stack.
//! - A rule whose rewrite has nothing to act on (for example `set_path` on
//!   a payload without a start line slot) fails like any other callback

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MiddlewareConfig, RuleAction, RuleConfig};
use crate::dispatch::{CallbackResult, ChannelKey, ChannelKeyError, Handle, Registry};
use crate::http;
use crate::message::{Message, MessageType};

/// Environment variable that carries the rule set to worker processes.
pub const SNAPSHOT_ENV: &str = "GOR_MIDDLEWARE_SNAPSHOT";

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule {index}: {source}")]
    Channel {
        index: usize,
        #[source]
        source: ChannelKeyError,
    },

    #[error("invalid rule snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Channel key a rule subscribes to.
pub fn channel_key(rule: &RuleConfig) -> Result<ChannelKey, ChannelKeyError> {
    match &rule.id {
        Some(id) => format!("{}#{}", rule.channel, id).parse(),
        None => rule.channel.parse(),
    }
}

/// Ordered, read-only set of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<RuleConfig>,
}

impl RuleSet {
    pub fn new(rules: Vec<RuleConfig>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &MiddlewareConfig) -> Self {
        Self::new(config.rules.clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn to_snapshot(&self) -> Result<String, RuleError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_snapshot(snapshot: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(snapshot)?)
    }

    /// Rule set handed down by the parent process, empty if none was.
    pub fn from_env() -> Result<Self, RuleError> {
        match std::env::var(SNAPSHOT_ENV) {
            Ok(snapshot) => Self::from_snapshot(&snapshot),
            Err(_) => {
                tracing::debug!(env = SNAPSHOT_ENV, "No rule snapshot, running without rules");
                Ok(Self::default())
            }
        }
    }

    /// Subscribe every rule, in file order.
    pub fn build_registry(&self) -> Result<Registry, RuleError> {
        let mut registry = Registry::new();
        self.register(&mut registry)?;
        Ok(registry)
    }

    /// Append the rules to an existing registry.
    pub fn register(&self, registry: &mut Registry) -> Result<(), RuleError> {
        for (index, rule) in self.rules.iter().enumerate() {
            let key = channel_key(rule).map_err(|source| RuleError::Channel { index, source })?;
            tracing::debug!(index, channel = %key, action = ?rule.action, "Rule registered");
            registry.on(key, rule.action.clone(), apply);
        }
        Ok(())
    }
}

fn apply(handle: &Handle, message: &Message, action: &RuleAction) -> CallbackResult {
    let payload = message.payload();
    let rewritten = match action {
        RuleAction::SetHeader { name, value } => http::set_header(payload, name, value),
        RuleAction::DeleteHeader { name } => http::delete_header(payload, name),
        RuleAction::SetPath { path } => http::set_path(payload, path)?,
        RuleAction::SetPathParam { name, value } => http::set_path_param(payload, name, value)?,
        RuleAction::SetStatus { status } => http::set_status(payload, status)?,
        RuleAction::SetBody { body } => http::set_body(payload, body.as_bytes()),
        RuleAction::SetCookie { name, value } => http::set_cookie(payload, name, value),
        RuleAction::DeleteCookie { name } => http::delete_cookie(payload, name),
        RuleAction::Log => {
            log_message(handle, message);
            return Ok(None);
        }
    };

    Ok(Some(message.with_payload(rewritten)))
}

fn log_message(handle: &Handle, message: &Message) {
    let payload = message.payload();
    match message.kind() {
        MessageType::Response => tracing::info!(
            worker = handle.worker(),
            id = %message.id(),
            kind = %message.kind(),
            status = http::status(payload).unwrap_or("-"),
            "Message"
        ),
        MessageType::Request | MessageType::Replay => tracing::info!(
            worker = handle.worker(),
            id = %message.id(),
            kind = %message.kind(),
            method = http::method(payload).unwrap_or("-"),
            path = http::path(payload).unwrap_or("-"),
            "Message"
        ),
    }
}
