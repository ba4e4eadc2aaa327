// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build static assets through sequence/parallel task graphs, with watch and live reload.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value = "Assetdag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build once, then watch sources and serve with live reload.
    Dev,
    /// Optimized one-shot build.
    Prod {
        /// Keep watching after the build, using the prod watch rules.
        #[arg(long)]
        watch: bool,
    },
    /// Optimized build packaged into the distribution directories.
    Dist,
    /// Execute a single named task once.
    Run {
        /// Task name as declared in the config.
        #[arg(value_name = "TASK")]
        task: String,
    },
    /// Validate the config and print paths, steps, tasks and modes.
    List,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
