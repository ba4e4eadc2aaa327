// src/logging.rs

//! Logging setup for `assetdag` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen in this order:
//! 1. `--log-level` CLI flag
//! 2. `ASSETDAG_LOG`, parsed as `EnvFilter` directives
//!    (e.g. `debug` or `assetdag=debug,tower_http=info`)
//! 3. `info`
//!
//! The dev server's HTTP and websocket stacks are held at `warn` unless a
//! directive names them. Logs go to STDERR; `list` prints to stdout.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "ASSETDAG_LOG";

const QUIET_TARGETS: &[&str] = &["hyper", "tower_http", "tungstenite", "notify"];

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

/// Resolve the filter from the CLI flag and the raw `ASSETDAG_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let directives = match (cli_level, env.map(str::trim)) {
        (Some(level), _) => level_name(level).to_string(),
        (None, Some(env)) if !env.is_empty() => env.to_string(),
        _ => "info".to_string(),
    };

    let mut filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?} (from {LOG_ENV})"))?;
    for target in QUIET_TARGETS {
        if !directives.contains(target) {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }
    Ok(filter)
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
