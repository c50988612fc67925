//! Configuration schema definitions.
//!
//! All types derive Serde traits: they are read from TOML and, for the
//! process backend, shipped to workers as JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the middleware.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Concurrency backend and worker pool.
    pub engine: EngineConfig,

    /// Log level and format.
    pub logging: LoggingConfig,

    /// Declarative subscriptions registered at startup.
    pub rules: Vec<RuleConfig>,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrency substrate.
    pub backend: Backend,

    /// Number of workers (tasks, threads or processes).
    pub workers: usize,

    /// Capacity of each bounded worker queue.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            workers: 2,
            queue_capacity: 1024,
        }
    }
}

/// Concurrency substrate for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Tasks on a single-threaded tokio runtime, one queue per worker.
    #[default]
    Cooperative,
    /// OS threads, one queue per worker.
    Threaded,
    /// Worker processes fed through pipes.
    Process,
    /// Single-threaded tasks sharing one queue, no partitioning.
    Legacy,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cooperative => "cooperative",
            Backend::Threaded => "threaded",
            Backend::Process => "process",
            Backend::Legacy => "legacy",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cooperative" => Ok(Backend::Cooperative),
            "threaded" => Ok(Backend::Threaded),
            "process" => Ok(Backend::Process),
            "legacy" => Ok(Backend::Legacy),
            other => Err(format!(
                "unknown backend {other:?} (expected cooperative, threaded, process or legacy)"
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level or filter directive (trace, debug, info, warn, error).
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (expected pretty, compact or json)")),
        }
    }
}

/// One declarative subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleConfig {
    /// `message`, `request`, `response` or `replay`.
    pub channel: String,

    /// Restrict the rule to one exchange.
    #[serde(default)]
    pub id: Option<String>,

    /// What to do with matching messages.
    pub action: RuleAction,
}

/// Payload mutation applied by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    SetHeader { name: String, value: String },
    DeleteHeader { name: String },
    SetPath { path: String },
    SetPathParam { name: String, value: String },
    SetStatus { status: String },
    SetBody { body: String },
    SetCookie { name: String, value: String },
    DeleteCookie { name: String },
    /// Log the message's start line; no replacement.
    Log,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MiddlewareConfig::default();
        assert_eq!(config.engine.backend, Backend::Cooperative);
        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.logging.level, "info");
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("threaded".parse::<Backend>(), Ok(Backend::Threaded));
        assert_eq!("PROCESS".parse::<Backend>(), Ok(Backend::Process));
        assert!("fibers".parse::<Backend>().is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(LogFormat::Compact.as_str(), "compact");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut config = MiddlewareConfig::default();
        config.engine.backend = Backend::Process;
        config.rules.push(RuleConfig {
            channel: "request".into(),
            id: None,
            action: RuleAction::SetHeader {
                name: "X-Test".into(),
                value: "1".into(),
            },
        });
        config.rules.push(RuleConfig {
            channel: "response".into(),
            id: Some("abc".into()),
            action: RuleAction::Log,
        });

        let json = serde_json::to_string(&config).unwrap();
        let back: MiddlewareConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
