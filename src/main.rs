//! gor-middleware binary.
//!
//! Loads the TOML config, applies CLI overrides, turns `[[rules]]` into a
//! registry and runs the engine on stdin/stdout until end of input or a
//! signal. Logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gor_middleware::config::{self, Backend, LogFormat, MiddlewareConfig};
use gor_middleware::engine::{self, Engine, WorkerCommand};
use gor_middleware::observability::logging;
use gor_middleware::rules::{RuleSet, SNAPSHOT_ENV};

#[derive(Parser)]
#[command(name = "gor-middleware", version)]
#[command(about = "Rewrite captured HTTP traffic between capture and replay", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "GOR_MIDDLEWARE_CONFIG")]
    config: Option<PathBuf>,

    /// cooperative, threaded, process or legacy
    #[arg(short, long, global = true)]
    backend: Option<Backend>,

    /// Number of workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Log level or filter directive
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process stdin to stdout (default)
    Run,
    /// Serve one process-backend worker
    #[command(hide = true)]
    Worker,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => MiddlewareConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.engine.backend = backend;
    }
    if let Some(workers) = cli.workers {
        config.engine.workers = workers;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    if let Err(errors) = config::validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init_logging(&config.logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config),
        Commands::Worker => worker(),
    }
}

fn run(config: MiddlewareConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rules = RuleSet::from_config(&config);
    let registry = rules.build_registry()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.engine.backend,
        workers = config.engine.workers,
        rules = rules.len(),
        "gor-middleware starting"
    );

    let mut engine = Engine::new(config.engine.clone(), registry);
    if config.engine.backend == Backend::Process {
        let command = WorkerCommand::current_exe()?
            .arg("worker")
            .arg("--log-level")
            .arg(&config.logging.level)
            .arg("--log-format")
            .arg(config.logging.format.as_str())
            .env(SNAPSHOT_ENV, rules.to_snapshot()?);
        engine = engine.with_worker_command(command);
    }

    let report = engine.run_stdio()?;
    tracing::info!(
        lines = report.lines_read,
        emitted = report.emitted,
        dropped = report.dropped,
        "Shutdown complete"
    );
    Ok(())
}

fn worker() -> Result<(), Box<dyn std::error::Error>> {
    let worker = std::env::var(engine::WORKER_INDEX_ENV)
        .ok()
        .and_then(|index| index.parse().ok())
        .unwrap_or(0);
    let registry = RuleSet::from_env()?.build_registry()?;

    let report = engine::process::serve_stdio(registry, worker)?;
    tracing::debug!(worker, emitted = report.emitted, "Worker finished");
    Ok(())
}
