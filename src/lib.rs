// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod mode;
pub mod reload;
pub mod step;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::load_and_validate;
use crate::config::ConfigFile;
use crate::graph::RunResult;
use crate::mode::ModeRunner;
use crate::types::Mode;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, then either prints it (`list`), runs one
/// task (`run`), or hands a mode to the [`ModeRunner`].
pub async fn run(args: CliArgs) -> Result<RunResult> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;
    let root = config_root_dir(&config_path);

    let runner = ModeRunner::new(cfg, root)?;

    let result = match &args.command {
        Command::Run { task } => runner.run_task(task).await?,
        Command::Prod { watch } => runner.run_mode(Mode::Prod, *watch).await?,
        Command::Dev => runner.run_mode(Mode::Dev, false).await?,
        Command::Dist => runner.run_mode(Mode::Dist, false).await?,
        Command::List => {
            print_dry_run(runner.config(), &runner);
            RunResult::Completed
        }
    };

    Ok(result)
}

/// Figure out the project root from the config location.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetdag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetdag.toml" (parent = ""),
///   we fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// `list` output: paths, steps, cleans, composites and modes, without running.
fn print_dry_run(cfg: &ConfigFile, runner: &ModeRunner) {
    let section = cfg.config_section();
    println!("assetdag dry-run");
    println!("  root = {:?}", runner.root());
    println!("  config.state_dir = {}", section.state_dir);
    println!(
        "  config.triggered_while_running_behaviour = {:?}",
        section.triggered_while_running_behaviour
    );
    println!("  config.stamp_storage = {:?}", section.stamp_storage);
    println!();

    println!("paths ({}):", cfg.paths().len());
    for (asset, paths) in cfg.paths() {
        println!("  - {asset}");
        if !paths.src.is_empty() {
            println!("      src: {:?}", paths.src);
        }
        if paths.watch.is_some() {
            println!("      watch: {:?}", paths.watch_patterns());
        }
        if let Some(dest) = &paths.dest {
            println!("      dest: {dest}");
        }
        if let Some(dist) = &paths.dist {
            println!("      dist: {dist}");
        }
    }
    println!();

    println!("steps ({}):", cfg.steps().len());
    for (name, step) in cfg.steps() {
        let state = if step.enabled { "" } else { " (disabled)" };
        println!("  - {name}{state}");
        println!(
            "      {} {} -> {}",
            step.asset,
            step.input.as_str(),
            step.output.as_str()
        );
        for transform in &step.transforms {
            println!("      transform: {transform:?}");
        }
        if step.since_last_run {
            println!("      since_last_run: true");
        }
        if step.require_input {
            println!("      require_input: true");
        }
    }
    println!();

    println!("cleans ({}):", cfg.cleans().len());
    for (name, clean) in cfg.cleans() {
        println!("  - {name}");
        if !clean.assets.is_empty() {
            println!("      {} of {:?}", clean.location.as_str(), clean.assets);
        }
        if !clean.dirs.is_empty() {
            println!("      dirs: {:?}", clean.dirs);
        }
    }
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    debug!(graph_nodes = runner.graph().tasks().count(), "resolved task graph");
    for (name, task) in cfg.tasks() {
        match task.combinator() {
            Some((combinator, children)) => {
                println!("  - {name}: {combinator:?} {children:?}");
            }
            None => println!("  - {name}"),
        }
    }
    println!();

    for (mode, mode_cfg) in cfg.modes().iter() {
        println!("mode.{mode}: task = {}", mode_cfg.task);
        if mode_cfg.serve {
            let server = cfg.server();
            println!(
                "    serve: http://{}:{}/ (reload port {})",
                server.host, server.port, server.reload_port
            );
        }
        if mode_cfg.watch {
            println!("    watch: true");
        }
        for rule in &mode_cfg.watch_rules {
            let action = match (&rule.task, rule.reload) {
                (Some(task), _) => format!("task {task}"),
                (None, _) => "reload".to_string(),
            };
            let hash = if rule.use_hash { " (use_hash)" } else { "" };
            println!("    {} -> {action}{hash}", rule.label());
        }
    }

    debug!("dry-run complete (no execution)");
}
